//! Storage module for persisting harvested records
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Record insertion with natural-key uniqueness
//! - Run tracking for observability

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{RecordStore, StorageError, StorageResult};

use crate::HarvestError;
use serde::Deserialize;
use std::path::Path;

/// Opens (or creates) the record store at `path`
pub fn open_store(path: &Path, natural_key: NaturalKey) -> Result<SqliteStore, HarvestError> {
    Ok(SqliteStore::open(path, natural_key)?)
}

/// Opens the record store at `path` with every stored record discarded
pub fn open_fresh_store(path: &Path, natural_key: NaturalKey) -> Result<SqliteStore, HarvestError> {
    Ok(SqliteStore::open_fresh(path, natural_key)?)
}

/// Field combination that identifies a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NaturalKey {
    /// The title alone
    Title,

    /// Title plus initial release date, so remakes sharing a title coexist
    #[default]
    TitleAndReleaseDate,
}

impl NaturalKey {
    /// Every supported key
    pub const ALL: [NaturalKey; 2] = [NaturalKey::Title, NaturalKey::TitleAndReleaseDate];

    /// Name used in the config file
    pub fn name(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::TitleAndReleaseDate => "title-and-release-date",
        }
    }

    /// Columns covered by the unique index
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::Title => &["title"],
            Self::TitleAndReleaseDate => &["title", "initial_release_date"],
        }
    }
}

/// The flat unit persisted for every harvested work
///
/// Every text field is always populated; values that could not be extracted
/// are stored as empty strings.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub title: String,
    /// Stored as NULL for unrated works
    pub rating_score: Option<f64>,
    pub detail_url: String,
    pub rating_people_count: String,
    pub directors: String,
    pub script_writers: String,
    pub actors: String,
    pub genres: String,
    pub production_countries_regions: String,
    pub initial_release_date: String,
}

/// Result of a record insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record is now stored
    Inserted,

    /// A record with the same natural key already exists; nothing changed
    DuplicateKey,
}

/// Counters collected over one harvest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Non-terminal search pages processed
    pub pages: u64,

    /// Valid stubs seen across all pages
    pub stubs: u64,

    /// Records newly stored
    pub inserted: u64,

    /// Records discarded because their natural key was already stored
    pub duplicates: u64,

    /// Stubs skipped because their detail page could not be fetched
    pub fetch_failures: u64,

    /// Search entries dropped as unusable
    pub invalid_entries: u64,
}

/// Represents a harvest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub stats: CrawlStats,
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Cancelled,
            RunStatus::Failed,
        ] {
            let db_str = status.to_db_string();
            assert_eq!(Some(*status), RunStatus::from_db_string(db_str));
        }
    }

    #[test]
    fn test_run_status_invalid() {
        assert_eq!(RunStatus::from_db_string("interrupted"), None);
    }

    #[test]
    fn test_natural_key_default_is_richer_variant() {
        assert_eq!(NaturalKey::default(), NaturalKey::TitleAndReleaseDate);
        assert_eq!(
            NaturalKey::TitleAndReleaseDate.columns(),
            &["title", "initial_release_date"]
        );
        assert_eq!(NaturalKey::Title.columns(), &["title"]);
    }
}
