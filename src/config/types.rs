use crate::search::{RatingRange, SearchQuery, SortKey};
use crate::storage::NaturalKey;
use crate::ConfigError;
use serde::Deserialize;

/// Search endpoint used when the config does not name one
pub const DEFAULT_SEARCH_URL: &str = "https://movie.douban.com/j/new_search_subjects";

/// Identifying user agent sent with every request unless overridden
pub const DEFAULT_USER_AGENT: &str = "learning_chinese_with_tv_shows";

/// Main configuration structure for Tagsweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub search: SearchConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Builds the immutable search query described by the `[search]` table
    pub fn query(&self) -> Result<SearchQuery, ConfigError> {
        let [low, high] = self.search.rating_range;
        let range = RatingRange::new(low, high)?;
        Ok(SearchQuery::new(
            self.search.tags.clone(),
            range,
            self.search.sort,
        ))
    }
}

/// Search endpoint and query parameters
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the JSON search endpoint
    #[serde(default = "default_search_url")]
    pub url: String,

    /// Tags sent comma-joined, in order
    pub tags: Vec<String>,

    /// Inclusive rating bounds as `[low, high]`
    #[serde(rename = "rating-range")]
    pub rating_range: [f64; 2],

    /// Sort order code (`T`, `S`, `R` or `U`)
    pub sort: SortKey,
}

/// Crawler pacing and resilience settings
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Pause after every detail page (milliseconds)
    #[serde(rename = "detail-delay-ms", default = "default_detail_delay_ms")]
    pub detail_delay_ms: u64,

    /// Timeout applied to every HTTP request (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Extra attempts for a search page after a transient failure
    #[serde(rename = "max-page-retries", default = "default_max_page_retries")]
    pub max_page_retries: u32,

    /// Initial backoff between search page attempts (milliseconds), doubled each retry
    #[serde(rename = "retry-backoff-ms", default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Number of detail pages fetched concurrently within one search page
    #[serde(rename = "detail-workers", default = "default_detail_workers")]
    pub detail_workers: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            detail_delay_ms: default_detail_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            max_page_retries: default_max_page_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            detail_workers: default_detail_workers(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Value of the `User-Agent` header
    #[serde(default = "default_user_agent")]
    pub name: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            name: default_user_agent(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Field combination that identifies a record
    #[serde(rename = "natural-key", default)]
    pub natural_key: NaturalKey,
}

fn default_search_url() -> String {
    DEFAULT_SEARCH_URL.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_detail_delay_ms() -> u64 {
    100
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_page_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_detail_workers() -> u32 {
    1
}
