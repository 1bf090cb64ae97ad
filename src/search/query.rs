//! Search query definitions
//!
//! A `SearchQuery` is built once from configuration and never changes during a
//! harvest; the page iterator only varies the `start` offset.

use crate::ConfigError;
use serde::Deserialize;
use std::fmt;

/// Sort order understood by the search endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SortKey {
    /// Most rated first
    #[serde(rename = "T")]
    HighestRatingCount,

    /// Best rated first
    #[serde(rename = "S")]
    HighestRating,

    /// Newest release first
    #[serde(rename = "R")]
    LatestRelease,

    /// Currently popular first
    #[serde(rename = "U")]
    RecentlyPopular,
}

impl SortKey {
    /// Returns the single-letter code sent as the `sort` parameter
    pub fn as_param(&self) -> &'static str {
        match self {
            Self::HighestRatingCount => "T",
            Self::HighestRating => "S",
            Self::LatestRelease => "R",
            Self::RecentlyPopular => "U",
        }
    }

    /// Parses a single-letter sort code
    pub fn from_param(s: &str) -> Option<Self> {
        match s {
            "T" => Some(Self::HighestRatingCount),
            "S" => Some(Self::HighestRating),
            "R" => Some(Self::LatestRelease),
            "U" => Some(Self::RecentlyPopular),
            _ => None,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

/// Inclusive rating bounds with `low <= high`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingRange {
    low: f64,
    high: f64,
}

impl RatingRange {
    /// Creates a range, rejecting non-finite or inverted bounds
    pub fn new(low: f64, high: f64) -> Result<Self, ConfigError> {
        if !low.is_finite() || !high.is_finite() {
            return Err(ConfigError::Validation(format!(
                "rating bounds must be finite, got ({}, {})",
                low, high
            )));
        }
        if low > high {
            return Err(ConfigError::Validation(format!(
                "rating low bound {} exceeds high bound {}",
                low, high
            )));
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }
}

/// Immutable description of what to harvest
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    tags: Vec<String>,
    rating_range: RatingRange,
    sort: SortKey,
}

impl SearchQuery {
    pub fn new(tags: Vec<String>, rating_range: RatingRange, sort: SortKey) -> Self {
        Self {
            tags,
            rating_range,
            sort,
        }
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn rating_range(&self) -> RatingRange {
        self.rating_range
    }

    pub fn sort(&self) -> SortKey {
        self.sort
    }

    /// Value of the `tags` parameter: tags joined by commas, order preserved
    pub fn tags_param(&self) -> String {
        self.tags.join(",")
    }

    /// Value of the `range` parameter, e.g. `5,10`
    ///
    /// Whole numbers are written without a fractional part, matching the form
    /// the endpoint documents.
    pub fn range_param(&self) -> String {
        format!(
            "{},{}",
            format_bound(self.rating_range.low),
            format_bound(self.rating_range.high)
        )
    }

    /// Full query string parameters for the page at `offset`
    pub fn params(&self, offset: u64) -> Vec<(&'static str, String)> {
        vec![
            ("sort", self.sort.as_param().to_string()),
            ("tags", self.tags_param()),
            ("start", offset.to_string()),
            ("range", self.range_param()),
        ]
    }
}

fn format_bound(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}
