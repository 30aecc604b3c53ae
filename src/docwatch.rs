//! Document change detection.
//!
//! Each watched document keeps one cached copy in the working directory,
//! named after the final URL path segment. A check fetches the current
//! version, classifies it against the cache and writes the fetched copy
//! through on bootstrap or change.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use reqwest::Url;
use similar::TextDiff;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::transfer::HttpFetcher;
use crate::utils::errors::{AgentError, Result};

/// Tri-state result of comparing a fetched document against its cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    /// No prior copy existed.
    Bootstrap,
    Unchanged,
    Changed,
}

pub struct DocumentWatcher {
    cache_dir: PathBuf,
}

impl DocumentWatcher {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Fetch a document and classify it against the cached prior version.
    ///
    /// Returns the change status and, for `Changed`, the textual diff.
    pub async fn check(
        &self,
        fetcher: &HttpFetcher,
        url: &Url,
    ) -> Result<(ChangeStatus, Option<String>)> {
        let (body, content_type) = fetcher.fetch_text(url).await?;
        let text = if is_html(content_type.as_deref()) {
            render_html(&body).await?
        } else {
            body
        };

        let cache = self.cache_path(url)?;
        let (status, changes) = classify(&cache, &text, url.as_str())?;
        debug!("{url}: {status:?}");
        if status != ChangeStatus::Unchanged {
            std::fs::write(&cache, &text)?;
        }
        Ok((status, changes))
    }

    fn cache_path(&self, url: &Url) -> Result<PathBuf> {
        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| {
                AgentError::Config(format!("cannot derive a cache file name from {url}"))
            })?;
        Ok(self.cache_dir.join(name))
    }
}

/// Compare fetched text against the cache file.
pub fn classify(cache: &Path, fetched: &str, url: &str) -> Result<(ChangeStatus, Option<String>)> {
    if !cache.exists() {
        return Ok((ChangeStatus::Bootstrap, None));
    }
    let previous = std::fs::read_to_string(cache)?;
    match diff_documents(&previous, fetched, url) {
        None => Ok((ChangeStatus::Unchanged, None)),
        Some(diff) => Ok((ChangeStatus::Changed, Some(diff))),
    }
}

/// Unified diff between two document versions, with the source URL appended
/// so notification daemons can open it directly.
pub fn diff_documents(previous: &str, current: &str, url: &str) -> Option<String> {
    if previous == current {
        return None;
    }
    let diff = TextDiff::from_lines(previous, current)
        .unified_diff()
        .header("previous", "current")
        .to_string();
    Some(format!("{diff}\n{url}"))
}

fn is_html(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|value| value.starts_with("text/html"))
}

/// Convert HTML to plain text through w3m when it is installed, so diffs
/// stay readable in mail bodies and notification daemons without HTML
/// support. Without w3m the raw markup is compared as-is.
async fn render_html(body: &str) -> Result<String> {
    if which::which("w3m").is_err() {
        return Ok(body.to_string());
    }

    let mut child = Command::new("w3m")
        .args(["-dump", "-cols", "80", "-O", "ascii", "-T", "text/html"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(body.as_bytes()).await?;
    }
    let output = child.wait_with_output().await?;

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const URL: &str = "https://www.openbsd.org/faq/current.html";

    #[test]
    fn missing_cache_is_bootstrap() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("current.html");

        let (status, changes) = classify(&cache, "fresh content\n", URL).unwrap();

        assert_eq!(status, ChangeStatus::Bootstrap);
        assert!(changes.is_none());
    }

    #[test]
    fn identical_content_is_unchanged() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("current.html");
        fs::write(&cache, "same content\n").unwrap();

        let (status, changes) = classify(&cache, "same content\n", URL).unwrap();

        assert_eq!(status, ChangeStatus::Unchanged);
        assert!(changes.is_none());
    }

    #[test]
    fn differing_content_produces_a_diff() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("current.html");
        fs::write(&cache, "first line\nsecond line\n").unwrap();

        let (status, changes) = classify(&cache, "first line\nchanged line\n", URL).unwrap();

        assert_eq!(status, ChangeStatus::Changed);
        let diff = changes.unwrap();
        assert!(diff.contains("-second line"));
        assert!(diff.contains("+changed line"));
        assert!(diff.ends_with(URL));
    }

    #[test]
    fn diff_carries_previous_and_current_headers() {
        let diff = diff_documents("a\n", "b\n", URL).unwrap();
        assert!(diff.contains("--- previous"));
        assert!(diff.contains("+++ current"));
    }

    #[test]
    fn cache_name_is_final_url_segment() {
        let watcher = DocumentWatcher::new(PathBuf::from("/var/db/agent"));
        let url = Url::parse("https://www.openbsd.org/faq/current.html").unwrap();
        assert_eq!(
            watcher.cache_path(&url).unwrap(),
            PathBuf::from("/var/db/agent/current.html")
        );
    }

    #[test]
    fn directory_urls_have_no_cache_name() {
        let watcher = DocumentWatcher::new(PathBuf::from("/var/db/agent"));
        let url = Url::parse("https://www.openbsd.org/faq/").unwrap();
        assert!(watcher.cache_path(&url).is_err());
    }

    #[test]
    fn html_detection_accepts_charset_suffix() {
        assert!(is_html(Some("text/html; charset=utf-8")));
        assert!(is_html(Some("text/html")));
        assert!(!is_html(Some("text/plain")));
        assert!(!is_html(None));
    }
}
