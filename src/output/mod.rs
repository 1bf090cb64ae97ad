//! Output module for reporting harvest results
//!
//! This module handles reading back stored record counts and run counters
//! for the `--stats` mode.

pub mod stats;

pub use stats::{load_statistics, print_statistics, HarvestStatistics};
