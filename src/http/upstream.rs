//! Outbound client for the protected downstream service.
//!
//! # Design Decisions
//! - Connection errors, timeouts and 5xx count as failures
//! - 4xx are NOT failures (client error, not the dependency's)
//! - The breaker wraps `fetch`; this module knows nothing about it

use std::time::Duration;
use thiserror::Error;

use crate::config::UpstreamConfig;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned {0}")]
    Status(u16),
}

/// A response the dependency produced without failing.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct Upstream {
    client: reqwest::Client,
    url: String,
}

impl Upstream {
    /// Build a client for `config`, or `None` when no URL is configured.
    pub fn from_config(config: &UpstreamConfig) -> Result<Option<Self>, reqwest::Error> {
        let Some(url) = config.url.clone() else {
            return Ok(None);
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Some(Self { client, url }))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> Result<UpstreamResponse, UpstreamError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if status.is_server_error() {
            return Err(UpstreamError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        Ok(UpstreamResponse {
            status: status.as_u16(),
            body,
        })
    }
}
