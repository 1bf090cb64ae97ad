//! Tagsweep: a paginated metadata harvester
//!
//! This crate walks a tag-filtered search endpoint page by page, follows every
//! result to its detail page, extracts a fixed set of metadata fields with
//! per-field graceful degradation, and stores each record once in SQLite.

pub mod config;
pub mod crawler;
pub mod output;
pub mod search;
pub mod storage;

use thiserror::Error;

/// Main error type for harvest operations
///
/// Only failures on the search path, storage failures and cancellation end up
/// here. Detail-page and field-level failures are absorbed by the pipeline.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Search request to {url} failed after {attempts} attempt(s): {source}")]
    SearchTransport {
        url: String,
        attempts: u32,
        source: reqwest::Error,
    },

    #[error("Search request to {url} returned HTTP {status}")]
    SearchStatus { url: String, status: u16 },

    #[error("Undecodable search response from {url}: {message}")]
    SearchDecode { url: String, message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("Failed to acquire worker permit: {0}")]
    WorkerPool(#[from] tokio::sync::AcquireError),

    #[error("Harvest cancelled")]
    Cancelled,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CancelSignal, Coordinator, CrawlStats};
pub use search::{ResultStub, SearchQuery, SortKey};
pub use storage::{InsertOutcome, NaturalKey, Record};
