//! File transfer from the mirror.

pub mod http;

pub use http::HttpFetcher;

use std::path::Path;

use async_trait::async_trait;
use reqwest::Url;

use crate::utils::errors::Result;

/// Retrieves a single remote file to a local path.
///
/// No retry and no integrity checking happen at this layer; callers treat
/// any failure as "this file is unusable" and abort or retry whole files.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url, dest: &Path) -> Result<()>;
}
