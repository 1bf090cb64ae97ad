//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::storage::{RecordStore, RunRecord};
use crate::HarvestError;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Number of records currently stored
    pub total_records: u64,

    /// Most recent harvest run, if any
    pub latest_run: Option<RunRecord>,

    /// Wall-clock duration of the latest run, once it has finished
    pub latest_run_seconds: Option<i64>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The store to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(store: &dyn RecordStore) -> Result<HarvestStatistics, HarvestError> {
    let total_records = store.count_records()?;
    let latest_run = store.get_latest_run()?;
    let latest_run_seconds = latest_run.as_ref().and_then(run_duration_seconds);

    Ok(HarvestStatistics {
        total_records,
        latest_run,
        latest_run_seconds,
    })
}

fn run_duration_seconds(run: &RunRecord) -> Option<i64> {
    let started = run
        .started_at
        .parse::<chrono::DateTime<chrono::Utc>>()
        .ok()?;
    let finished = run
        .finished_at
        .as_deref()?
        .parse::<chrono::DateTime<chrono::Utc>>()
        .ok()?;
    Some((finished - started).num_seconds())
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Records stored: {}", stats.total_records);
    println!();

    let Some(run) = &stats.latest_run else {
        println!("No harvest runs recorded yet");
        return;
    };

    println!("Latest Run (#{}):", run.id);
    println!("  Status: {}", run.status.to_db_string());
    println!("  Started: {}", run.started_at);
    match &run.finished_at {
        Some(finished) => println!("  Finished: {}", finished),
        None => println!("  Finished: -"),
    }
    if let Some(seconds) = stats.latest_run_seconds {
        println!("  Duration: {}s", seconds);
    }
    println!("  Config hash: {}", run.config_hash);
    println!();

    println!("  Search pages: {}", run.stats.pages);
    println!("  Results seen: {}", run.stats.stubs);
    println!("  Inserted: {}", run.stats.inserted);
    println!("  Duplicates: {}", run.stats.duplicates);
    println!("  Detail fetch failures: {}", run.stats.fetch_failures);
    println!("  Invalid search entries: {}", run.stats.invalid_entries);
}
