//! HTTP fetcher backed by reqwest.

use std::path::Path;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Url;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::Fetcher;
use crate::utils::errors::{AgentError, Result};

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Fetch a document body as text, along with its `Content-Type` header.
    pub async fn fetch_text(&self, url: &Url) -> Result<(String, Option<String>)> {
        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(AgentError::HttpStatus {
                status: response.status(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        Ok((body, content_type))
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, dest: &Path) -> Result<()> {
        debug!("Fetching {} -> {}", url, dest.display());

        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(AgentError::HttpStatus {
                status: response.status(),
                url: url.to_string(),
            });
        }

        // Stream the body to disk chunk by chunk, overwriting any existing file.
        let mut file = File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;

        Ok(())
    }
}
