//! Result stubs decoded from search pages

use serde::Deserialize;
use serde_json::Value;

/// One entry of a search page, before detail-page enrichment
#[derive(Debug, Clone, PartialEq)]
pub struct ResultStub {
    pub title: String,
    /// `None` when the endpoint sends no usable rating, e.g. `""` for unrated works
    pub rating_score: Option<f64>,
    pub detail_url: String,
}

/// Wire shape of a `data` element; every field is optional so that a bad
/// entry is reported as invalid instead of failing the whole page
#[derive(Debug, Deserialize)]
struct RawStub {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    rate: Option<RawRate>,
    #[serde(default)]
    url: Option<String>,
}

/// The endpoint sends `rate` as a string (`"8.5"`), but numbers are accepted too
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRate {
    Number(f64),
    Text(String),
    Other(Value),
}

impl ResultStub {
    /// Converts one `data` element into a stub
    ///
    /// Returns a short reason when the entry lacks a title or a detail URL. A
    /// missing or unparseable rating only leaves `rating_score` empty.
    pub fn from_entry(entry: &Value) -> Result<Self, String> {
        let raw: RawStub = RawStub::deserialize(entry)
            .map_err(|e| format!("entry is not a result object: {}", e))?;

        let title = non_empty(raw.title).ok_or("missing title")?;
        let detail_url = non_empty(raw.url).ok_or("missing url")?;

        let rating_score = match raw.rate {
            Some(RawRate::Number(n)) => Some(n),
            Some(RawRate::Text(s)) => s.trim().parse::<f64>().ok(),
            Some(RawRate::Other(_)) | None => None,
        }
        .filter(|n| n.is_finite());

        if rating_score.is_none() {
            tracing::debug!("No usable rate for {}, storing it unrated", title);
        }

        Ok(Self {
            title,
            rating_score,
            detail_url,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Truthiness of a JSON value as the endpoint's consumers have always judged it
///
/// `null`, `false`, zero, and empty strings, arrays and objects are falsy.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
