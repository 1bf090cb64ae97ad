//! Detail page field extraction
//!
//! Each recognized field has exactly one strategy: a CSS query over the parsed
//! document, a pattern over the raw page text, or a query followed by a
//! pattern. Strategies run independently. A strategy that finds nothing or
//! hits malformed markup returns an `ExtractionMiss`, which costs only its own
//! field; the record is still produced with that field left `Absent`.
//!
//! # Strategy table
//!
//! | Field | Strategy | Shape |
//! |-------|----------|-------|
//! | rating_people | `a.rating_people > span` | first match |
//! | directors | `div#info > span > span > a[rel="v:directedBy"]` | all matches |
//! | script_writers | second credit block of `div#info` | all matches |
//! | actors | `div#info > span.actor > span.attrs > a` | all matches |
//! | genres | `div#info > span[property="v:genre"]` | all matches |
//! | production_countries_regions | label pattern over raw text | first match |
//! | initial_release_date | release span, then date pattern | first match |

use crate::crawler::fields::{ExtractedFields, Field, FieldValue};
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use thiserror::Error;

const RATING_PEOPLE_SELECTOR: &str = "a.rating_people > span";
const DIRECTORS_SELECTOR: &str = r#"div#info > span > span > a[rel="v:directedBy"]"#;
const SCRIPT_WRITERS_SELECTOR: &str =
    "div#info > span:nth-of-type(2) > span:nth-of-type(2) > a";
const ACTORS_SELECTOR: &str = "div#info > span.actor > span.attrs > a";
const GENRES_SELECTOR: &str = r#"div#info > span[property="v:genre"]"#;
const RELEASE_DATE_SELECTOR: &str = r#"div#info > span[property="v:initialReleaseDate"]"#;

const PRODUCTION_COUNTRIES_PATTERN: &str = r"(?s)制片国家/地区:</span>(.*?)<br\s*/?>";
const RELEASE_DATE_PATTERN: &str = r"(\d{4}-\d{2}-\d{2})|(\d{4}-\d{2})";

// Compiled once per process; a broken constant turns into a miss for its field.
static RATING_PEOPLE: LazyLock<Result<Selector, ExtractionMiss>> =
    LazyLock::new(|| selector(RATING_PEOPLE_SELECTOR));
static DIRECTORS: LazyLock<Result<Selector, ExtractionMiss>> =
    LazyLock::new(|| selector(DIRECTORS_SELECTOR));
static SCRIPT_WRITERS: LazyLock<Result<Selector, ExtractionMiss>> =
    LazyLock::new(|| selector(SCRIPT_WRITERS_SELECTOR));
static ACTORS: LazyLock<Result<Selector, ExtractionMiss>> =
    LazyLock::new(|| selector(ACTORS_SELECTOR));
static GENRES: LazyLock<Result<Selector, ExtractionMiss>> =
    LazyLock::new(|| selector(GENRES_SELECTOR));
static RELEASE_DATE: LazyLock<Result<Selector, ExtractionMiss>> =
    LazyLock::new(|| selector(RELEASE_DATE_SELECTOR));

static PRODUCTION_COUNTRIES_REGEX: LazyLock<Result<Regex, ExtractionMiss>> =
    LazyLock::new(|| compile(PRODUCTION_COUNTRIES_PATTERN));
static RELEASE_DATE_REGEX: LazyLock<Result<Regex, ExtractionMiss>> =
    LazyLock::new(|| compile(RELEASE_DATE_PATTERN));

/// Why a single field could not be extracted
#[derive(Debug, Clone, Error)]
pub enum ExtractionMiss {
    #[error("invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("no element matches '{selector}'")]
    NoMatch { selector: String },

    #[error("pattern '{pattern}' does not match")]
    PatternMismatch { pattern: String },
}

type Strategy = fn(&Html, &str) -> Result<FieldValue, ExtractionMiss>;

/// One strategy per field, evaluated in this order
const STRATEGIES: [(Field, Strategy); 7] = [
    (Field::RatingPeopleCount, rating_people_count),
    (Field::Directors, directors),
    (Field::ScriptWriters, script_writers),
    (Field::Actors, actors),
    (Field::Genres, genres),
    (Field::ProductionCountriesRegions, production_countries_regions),
    (Field::InitialReleaseDate, initial_release_date),
];

/// Parses a detail page and extracts every recognized field
///
/// # Example
///
/// ```
/// use tagsweep::crawler::{extract, Field, FieldValue};
///
/// let html = r#"<div id="info"><span property="v:genre">剧情</span></div>"#;
/// let fields = extract(html);
/// assert_eq!(fields.get(Field::Genres), &FieldValue::Many(vec!["剧情".to_string()]));
/// assert!(fields.get(Field::InitialReleaseDate).is_absent());
/// ```
pub fn extract(raw_page_text: &str) -> ExtractedFields {
    let document = Html::parse_document(raw_page_text);
    extract_document(&document, raw_page_text)
}

/// Extracts every recognized field from an already parsed document
///
/// `raw_page_text` must be the text the document was parsed from; pattern
/// strategies run against it rather than against the tree.
pub fn extract_document(document: &Html, raw_page_text: &str) -> ExtractedFields {
    let mut fields = ExtractedFields::new();

    for (field, strategy) in STRATEGIES {
        match strategy(document, raw_page_text) {
            Ok(value) => fields.set(field, value),
            Err(miss) => {
                tracing::debug!("Field {} left empty: {}", field.name(), miss);
            }
        }
    }

    fields
}

// ===== Strategies =====

fn rating_people_count(document: &Html, _raw: &str) -> Result<FieldValue, ExtractionMiss> {
    first_text(document, ready(&RATING_PEOPLE)?, RATING_PEOPLE_SELECTOR).map(FieldValue::Single)
}

fn directors(document: &Html, _raw: &str) -> Result<FieldValue, ExtractionMiss> {
    Ok(FieldValue::Many(all_texts(document, ready(&DIRECTORS)?)))
}

fn script_writers(document: &Html, _raw: &str) -> Result<FieldValue, ExtractionMiss> {
    Ok(FieldValue::Many(all_texts(document, ready(&SCRIPT_WRITERS)?)))
}

fn actors(document: &Html, _raw: &str) -> Result<FieldValue, ExtractionMiss> {
    Ok(FieldValue::Many(all_texts(document, ready(&ACTORS)?)))
}

fn genres(document: &Html, _raw: &str) -> Result<FieldValue, ExtractionMiss> {
    Ok(FieldValue::Many(all_texts(document, ready(&GENRES)?)))
}

fn production_countries_regions(_document: &Html, raw: &str) -> Result<FieldValue, ExtractionMiss> {
    ready(&PRODUCTION_COUNTRIES_REGEX)?
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .map(FieldValue::Single)
        .ok_or_else(|| ExtractionMiss::PatternMismatch {
            pattern: PRODUCTION_COUNTRIES_PATTERN.to_string(),
        })
}

fn initial_release_date(document: &Html, _raw: &str) -> Result<FieldValue, ExtractionMiss> {
    let text = first_text(document, ready(&RELEASE_DATE)?, RELEASE_DATE_SELECTOR)?;
    ready(&RELEASE_DATE_REGEX)?
        .find(&text)
        .map(|m| FieldValue::Single(m.as_str().to_string()))
        .ok_or_else(|| ExtractionMiss::PatternMismatch {
            pattern: RELEASE_DATE_PATTERN.to_string(),
        })
}

// ===== Helpers =====

fn selector(css: &str) -> Result<Selector, ExtractionMiss> {
    Selector::parse(css).map_err(|e| ExtractionMiss::InvalidSelector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

fn compile(pattern: &str) -> Result<Regex, ExtractionMiss> {
    Regex::new(pattern).map_err(|source| ExtractionMiss::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// The compiled form of a constant, or the miss it failed with
fn ready<T>(compiled: &Result<T, ExtractionMiss>) -> Result<&T, ExtractionMiss> {
    compiled.as_ref().map_err(Clone::clone)
}

/// Trimmed text of the first matching element with non-empty text
fn first_text(document: &Html, selector: &Selector, css: &str) -> Result<String, ExtractionMiss> {
    document
        .select(selector)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .find(|text| !text.is_empty())
        .ok_or_else(|| ExtractionMiss::NoMatch {
            selector: css.to_string(),
        })
}

/// Trimmed texts of all matching elements, in document order
///
/// No match is an empty sequence, not a miss.
fn all_texts(document: &Html, selector: &Selector) -> Vec<String> {
    document
        .select(selector)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect()
}
