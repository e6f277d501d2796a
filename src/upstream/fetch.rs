//! Parallel source downloads.
//!
//! All assets are fetched with a bounded fan-out (one slot per CPU by default).
//! Every download is awaited even after a failure has been seen, then the first
//! failure is reported. Files already written are left in place.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::BuildConfig;
use crate::error::{PipelineError, Result};

/// Final path segment of a URL, used as the local file name.
pub fn file_name_from_url(url: &str) -> Result<String> {
    let parsed = reqwest::Url::parse(url).map_err(|e| PipelineError::Download {
        url: url.to_string(),
        reason: format!("invalid URL: {}", e),
    })?;

    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string())
        .ok_or_else(|| PipelineError::Download {
            url: url.to_string(),
            reason: "URL has no file name".to_string(),
        })
}

/// Concurrent downloader for release assets.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    client: reqwest::Client,
    workers: usize,
    timeout: Duration,
}

impl SourceFetcher {
    pub fn new(client: reqwest::Client, config: &BuildConfig) -> Self {
        SourceFetcher {
            client,
            workers: crate::system::parallelism(),
            timeout: config.download_timeout(),
        }
    }

    /// Override the worker pool size (minimum 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Download every URL into `dest`; fails if any single download fails.
    ///
    /// URLs sharing a final path segment would overwrite each other, so the
    /// batch is rejected before any request is made.
    pub async fn fetch_all(&self, urls: &[String], dest: &Path) -> Result<Vec<PathBuf>> {
        let mut names = HashSet::with_capacity(urls.len());
        for url in urls {
            let name = file_name_from_url(url)?;
            if !names.insert(name.clone()) {
                return Err(PipelineError::Download {
                    url: url.clone(),
                    reason: format!("duplicate file name {}", name),
                });
            }
        }

        log::info!(
            "[Fetch] Downloading {} source files ({} workers)",
            urls.len(),
            self.workers
        );

        let results: Vec<Result<PathBuf>> = stream::iter(urls.iter())
            .map(|url| self.fetch_one(url, dest))
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut paths = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(path) => paths.push(path),
                Err(e) => {
                    log::error!("[Fetch] {}", e);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                paths.sort();
                Ok(paths)
            }
        }
    }

    async fn fetch_one(&self, url: &str, dest: &Path) -> Result<PathBuf> {
        let name = file_name_from_url(url)?;
        let download_error = |reason: String| PipelineError::Download {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| download_error(e.to_string()))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| download_error(format!("failed to read body: {}", e)))?;

        let path = dest.join(&name);
        tokio::fs::write(&path, &body)
            .await
            .map_err(|e| download_error(format!("failed to write {}: {}", path.display(), e)))?;

        log::debug!("[Fetch] Saved {} ({} bytes)", name, body.len());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url(
                "https://github.com/openzfs/zfs/releases/download/zfs-2.1.2/zfs-2.1.2.tar.gz"
            )
            .unwrap(),
            "zfs-2.1.2.tar.gz"
        );
        assert_eq!(
            file_name_from_url("http://127.0.0.1:1234/a/b.asc?x=1").unwrap(),
            "b.asc"
        );
    }

    #[test]
    fn test_file_name_from_url_rejects_directory_urls() {
        assert!(file_name_from_url("https://example.com/releases/").is_err());
        assert!(file_name_from_url("not a url").is_err());
    }

    #[test]
    fn test_with_workers_has_floor_of_one() {
        let fetcher = SourceFetcher::new(reqwest::Client::new(), &BuildConfig::default())
            .with_workers(0);
        assert_eq!(fetcher.workers(), 1);
    }
}
