//! Record normalization
//!
//! Turns a search stub plus the extracted fields into the flat `Record` the
//! store persists. Every column is a plain string; sequences are stored as
//! JSON array text so they stay readable and can be decoded again.

use crate::crawler::fields::{ExtractedFields, Field, FieldValue};
use crate::search::ResultStub;
use crate::storage::Record;

/// Builds the persisted record for one stub
///
/// # Example
///
/// ```
/// use tagsweep::crawler::{normalize, ExtractedFields, Field, FieldValue};
/// use tagsweep::ResultStub;
///
/// let stub = ResultStub {
///     title: "山海情".to_string(),
///     rating_score: Some(9.4),
///     detail_url: "https://movie.douban.com/subject/35033654/".to_string(),
/// };
/// let mut fields = ExtractedFields::new();
/// fields.set(Field::Directors, FieldValue::Many(vec!["孔笙".into(), "孙墨龙".into()]));
///
/// let record = normalize(stub, &fields);
/// assert_eq!(record.directors, r#"["孔笙","孙墨龙"]"#);
/// assert_eq!(record.genres, "");
/// ```
pub fn normalize(stub: ResultStub, fields: &ExtractedFields) -> Record {
    let scalar = |field: Field| to_scalar(fields.get(field));

    Record {
        title: stub.title,
        rating_score: stub.rating_score,
        detail_url: stub.detail_url,
        rating_people_count: scalar(Field::RatingPeopleCount),
        directors: scalar(Field::Directors),
        script_writers: scalar(Field::ScriptWriters),
        actors: scalar(Field::Actors),
        genres: scalar(Field::Genres),
        production_countries_regions: scalar(Field::ProductionCountriesRegions),
        initial_release_date: scalar(Field::InitialReleaseDate),
    }
}

/// Canonical text for one field value
///
/// | Value | Text |
/// |-------|------|
/// | `Absent` | `""` |
/// | `Single(s)` | `s` |
/// | `Many([])` | `""` |
/// | `Many(xs)` | JSON array, e.g. `["a","b"]` |
pub fn to_scalar(value: &FieldValue) -> String {
    match value {
        FieldValue::Absent => String::new(),
        FieldValue::Single(s) => s.clone(),
        FieldValue::Many(items) if items.is_empty() => String::new(),
        FieldValue::Many(items) => serde_json::to_string(items).unwrap_or_else(|e| {
            tracing::warn!("Falling back to plain list text: {}", e);
            items.join(" / ")
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub() -> ResultStub {
        ResultStub {
            title: "大江大河".to_string(),
            rating_score: Some(8.8),
            detail_url: "https://movie.douban.com/subject/26797419/".to_string(),
        }
    }

    #[test]
    fn test_to_scalar_table() {
        assert_eq!(to_scalar(&FieldValue::Absent), "");
        assert_eq!(to_scalar(&FieldValue::Single("2018-12-10".into())), "2018-12-10");
        assert_eq!(to_scalar(&FieldValue::Many(vec![])), "");
        assert_eq!(
            to_scalar(&FieldValue::Many(vec!["王凯".into(), "杨烁".into()])),
            r#"["王凯","杨烁"]"#
        );
    }

    #[test]
    fn test_sequence_text_decodes_back() {
        let text = to_scalar(&FieldValue::Many(vec!["剧情".into(), "历史".into()]));
        let decoded: Vec<String> = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded, vec!["剧情", "历史"]);
    }

    #[test]
    fn test_all_absent_still_populates_every_column() {
        let record = normalize(stub(), &ExtractedFields::new());

        assert_eq!(record.title, "大江大河");
        assert_eq!(record.rating_score, Some(8.8));
        assert_eq!(record.detail_url, "https://movie.douban.com/subject/26797419/");
        for column in [
            &record.rating_people_count,
            &record.directors,
            &record.script_writers,
            &record.actors,
            &record.genres,
            &record.production_countries_regions,
            &record.initial_release_date,
        ] {
            assert_eq!(column, "");
        }
    }

    #[test]
    fn test_fields_map_to_matching_columns() {
        let mut fields = ExtractedFields::new();
        fields.set(Field::RatingPeopleCount, FieldValue::Single("12345".into()));
        fields.set(Field::ScriptWriters, FieldValue::Many(vec!["袁子弹".into()]));
        fields.set(
            Field::ProductionCountriesRegions,
            FieldValue::Single("中国大陆".into()),
        );
        fields.set(Field::InitialReleaseDate, FieldValue::Single("2018-12".into()));

        let record = normalize(stub(), &fields);
        assert_eq!(record.rating_people_count, "12345");
        assert_eq!(record.script_writers, r#"["袁子弹"]"#);
        assert_eq!(record.production_countries_regions, "中国大陆");
        assert_eq!(record.initial_release_date, "2018-12");
        assert_eq!(record.directors, "");
    }
}
