//! HTTP fetcher implementation
//!
//! This module handles detail-page requests for the harvester:
//! - Building the shared HTTP client with the identifying user agent and timeouts
//! - GET requests for detail pages
//! - Error classification into `FetchError`
//!
//! A `FetchError` only ever costs the one stub it belongs to.

use crate::config::{CrawlerConfig, UserAgentConfig};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Connect timeout applied independently of the request timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A fetched detail page
#[derive(Debug, Clone)]
pub struct DetailPage {
    /// Final URL after redirects
    pub url: String,

    /// Raw response text
    pub body: String,
}

/// Failure to retrieve one detail page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP error for {url}: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to read body of {url}: {source}")]
    Body { url: String, source: reqwest::Error },
}

impl FetchError {
    /// URL of the detail page that failed
    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url }
            | Self::Transport { url, .. }
            | Self::Status { url, .. }
            | Self::Body { url, .. } => url,
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// The same client serves search and detail requests. Every request carries
/// the configured timeout so no call can block indefinitely.
///
/// # Example
///
/// ```no_run
/// use tagsweep::config::{CrawlerConfig, UserAgentConfig};
/// use tagsweep::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default(), &CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.name.as_str())
        .timeout(Duration::from_secs(crawler.request_timeout_secs))
        .connect_timeout(CONNECT_TIMEOUT)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches one detail page
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx | `Ok(DetailPage)` |
/// | Other status | `FetchError::Status` |
/// | Timeout | `FetchError::Timeout` |
/// | Connection or protocol failure | `FetchError::Transport` |
/// | Body read failure | `FetchError::Body` |
pub async fn fetch_detail(client: &Client, url: &str) -> Result<DetailPage, FetchError> {
    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                source: e,
            }
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let final_url = response.url().to_string();

    let body = response.text().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Body {
                url: url.to_string(),
                source: e,
            }
        }
    })?;

    Ok(DetailPage {
        url: final_url,
        body,
    })
}
