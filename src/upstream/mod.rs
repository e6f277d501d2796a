//! Upstream release index and source downloads.
//!
//! - `release`: selects the latest or a pinned release and extracts its version
//! - `fetch`: downloads every asset of the selected release concurrently

pub mod fetch;
pub mod release;

pub use fetch::SourceFetcher;
pub use release::ReleaseResolver;

use crate::config::BuildConfig;
use crate::error::{PipelineError, Result};

/// Shared HTTP client. Timeouts are set per request by the callers.
pub fn http_client(config: &BuildConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| PipelineError::Network(format!("Failed to build HTTP client: {}", e)))
}
