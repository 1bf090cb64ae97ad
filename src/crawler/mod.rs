//! Crawler module for detail-page harvesting
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching of detail pages
//! - Per-field extraction with graceful degradation
//! - Normalization into storable records
//! - Overall harvest coordination and cancellation

mod cancel;
mod coordinator;
mod extractor;
mod fetcher;
mod fields;
mod normalizer;

pub use cancel::CancelSignal;
pub use coordinator::{run_harvest, Coordinator};
pub use extractor::{extract, extract_document, ExtractionMiss};
pub use fetcher::{build_http_client, fetch_detail, DetailPage, FetchError};
pub use fields::{ExtractedFields, Field, FieldValue};
pub use normalizer::{normalize, to_scalar};

pub use crate::storage::CrawlStats;
