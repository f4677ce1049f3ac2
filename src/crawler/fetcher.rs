//! Single-attempt page fetcher
//!
//! Performs one bounded-timeout HTTP GET and classifies the outcome so the
//! worker loop can decide between retrying and giving up. Connection-level
//! problems are transient; a response with a non-success status is terminal
//! for that URL, since retrying will not change the answer.

use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::CrawlerConfig;

/// Classified fetch failure
#[derive(Debug, Error)]
pub enum FetchError {
    /// Socket, connect, timeout, or I/O level failure; worth retrying.
    #[error("connection failure fetching {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// A response arrived but its status is not 2xx; retrying will not help.
    #[error("request for {url} returned status {status}")]
    Status { url: String, status: u16 },
}

impl FetchError {
    /// Whether a retry could plausibly change the outcome.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Connection { .. })
    }
}

/// HTTP fetcher shared by all worker loops.
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    /// Build a fetcher with the configured connect and read timeouts.
    pub fn new(config: &CrawlerConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }

    /// Fetch one URL, reading the body fully before the connection is
    /// released.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        debug!(url, "fetching");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Connection {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // Body read errors are connection-level: the handshake worked but
        // the transfer broke, which is the retryable case.
        response.text().await.map_err(|source| FetchError::Connection {
            url: url.to_string(),
            source,
        })
    }
}
