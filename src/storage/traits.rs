//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{CrawlStats, InsertOutcome, NaturalKey, Record, RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
///
/// A natural-key conflict is not an error; it is reported as
/// [`InsertOutcome::DuplicateKey`].
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error(
        "Stored records break the `{key}` natural key ({conflicts} duplicate group(s)); \
         rerun with --fresh or keep the previous natural-key setting"
    )]
    NaturalKeyConflict { key: &'static str, conflicts: u64 },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for record store implementations
///
/// The store owns uniqueness: two records with the same natural key can never
/// both be stored, and a conflicting insert leaves the existing record as it was.
pub trait RecordStore {
    // ===== Records =====

    /// Natural key enforced by this store
    fn natural_key(&self) -> NaturalKey;

    /// Stores a record unless its natural key is already present
    fn insert(&mut self, record: Record) -> StorageResult<InsertOutcome>;

    /// Looks up a record by its natural key
    ///
    /// `initial_release_date` is ignored when the store is keyed by title alone.
    fn find(&self, title: &str, initial_release_date: &str) -> StorageResult<Option<Record>>;

    /// Counts stored records
    fn count_records(&self) -> StorageResult<u64>;

    // ===== Run Management =====

    /// Creates a new harvest run in the `running` state
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Sets the final status, finish time and counters of a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus, stats: &CrawlStats)
        -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;
}
