//! Release resolution against the GitHub releases API.
//!
//! Without a pin the `latest` endpoint is used; with a pin the full release
//! list is searched for the exact tag `<prefix>-<version>`. The upstream
//! version is read from the *first* asset URL only, so asset order as served
//! by the index is preserved and never re-sorted.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;

use crate::config::BuildConfig;
use crate::error::{PipelineError, Result};
use crate::models::Release;

/// Strict pin format: three dot-separated non-negative integers
static PIN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+\.[0-9]+\.[0-9]+$").expect("Invalid pin regex"));

#[derive(Debug, Deserialize)]
struct IndexRelease {
    tag_name: String,
    #[serde(default)]
    assets: Vec<IndexAsset>,
}

#[derive(Debug, Deserialize)]
struct IndexAsset {
    browser_download_url: String,
}

impl IndexRelease {
    fn asset_urls(&self) -> Vec<String> {
        self.assets
            .iter()
            .map(|asset| asset.browser_download_url.clone())
            .collect()
    }
}

/// Reject anything that is not `X.Y.Z` before touching the network.
pub fn validate_pin(pin: &str) -> Result<()> {
    if PIN_REGEX.is_match(pin) {
        Ok(())
    } else {
        Err(PipelineError::Validation(format!(
            "Invalid release format '{}'. Expected x.y.z",
            pin
        )))
    }
}

/// Extract `X.Y.Z` from the first asset, which must look like `.../<name>-X.Y.Z.tar.gz`.
pub fn extract_version(assets: &[String], source_name: &str) -> Result<String> {
    let first = assets
        .first()
        .ok_or_else(|| PipelineError::Parse("No sources found in release".to_string()))?;

    let pattern = format!(
        r"/{}-([0-9]+\.[0-9]+\.[0-9]+)\.tar\.gz",
        regex::escape(source_name)
    );
    let regex = Regex::new(&pattern)
        .map_err(|e| PipelineError::Parse(format!("Failed to compile version regex: {}", e)))?;

    regex
        .captures(first)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            PipelineError::Parse(format!("Failed to extract version from source {}", first))
        })
}

fn map_request_error(context: &str, err: reqwest::Error) -> PipelineError {
    if err.is_decode() {
        PipelineError::Parse(format!("{}: invalid JSON response: {}", context, err))
    } else {
        PipelineError::Network(format!("{}: {}", context, err))
    }
}

/// Selects one upstream release per run.
#[derive(Debug, Clone)]
pub struct ReleaseResolver {
    client: reqwest::Client,
    api_url: String,
    tag_prefix: String,
    source_name: String,
    timeout: Duration,
}

impl ReleaseResolver {
    pub fn new(client: reqwest::Client, config: &BuildConfig) -> Self {
        ReleaseResolver {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            tag_prefix: config.tag_prefix.clone(),
            source_name: config.source_name.clone(),
            timeout: config.index_timeout(),
        }
    }

    /// Resolve the latest release, or exactly the pinned one.
    pub async fn resolve(&self, pinned: Option<&str>) -> Result<Release> {
        let index_release = match pinned {
            None => {
                log::info!("[Release] Fetching latest release information");
                self.fetch_latest().await?
            }
            Some(pin) => {
                validate_pin(pin)?;
                log::info!("[Release] Fetching release {} information", pin);
                self.fetch_pinned(pin).await?
            }
        };

        let assets = index_release.asset_urls();
        let version = extract_version(&assets, &self.source_name)?;
        log::info!(
            "[Release] Using version {} (tag {}, {} assets)",
            version,
            index_release.tag_name,
            assets.len()
        );

        Ok(Release {
            tag: index_release.tag_name,
            version,
            assets,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        log::debug!("[Release] GET {}", url);
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| map_request_error("Failed to query release index", e))?
            .error_for_status()
            .map_err(|e| map_request_error("Release index returned an error", e))?;

        response
            .json::<T>()
            .await
            .map_err(|e| map_request_error("Failed to read release index", e))
    }

    async fn fetch_latest(&self) -> Result<IndexRelease> {
        let url = format!("{}/latest", self.api_url);
        self.get_json(&url).await
    }

    async fn fetch_pinned(&self, pin: &str) -> Result<IndexRelease> {
        let wanted = format!("{}-{}", self.tag_prefix, pin);
        let releases: Vec<IndexRelease> = self.get_json(&self.api_url).await?;

        releases
            .into_iter()
            .find(|release| release.tag_name == wanted)
            .ok_or_else(|| PipelineError::NotFound(pin.to_string()))
    }
}
