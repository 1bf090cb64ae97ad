//! Extracted field model
//!
//! `ExtractedFields` stores one value slot per recognized field. The slots are a
//! fixed array indexed by [`Field`], so every key is present for the whole
//! life of the value; a failed extraction can only leave a slot `Absent`.

/// Fields read from a detail page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    RatingPeopleCount,
    Directors,
    ScriptWriters,
    Actors,
    Genres,
    ProductionCountriesRegions,
    InitialReleaseDate,
}

impl Field {
    /// Every recognized field, in storage column order
    pub const ALL: [Field; 7] = [
        Field::RatingPeopleCount,
        Field::Directors,
        Field::ScriptWriters,
        Field::Actors,
        Field::Genres,
        Field::ProductionCountriesRegions,
        Field::InitialReleaseDate,
    ];

    /// Column name used by the store
    pub fn name(&self) -> &'static str {
        match self {
            Self::RatingPeopleCount => "rating_people",
            Self::Directors => "directors",
            Self::ScriptWriters => "script_writers",
            Self::Actors => "actors",
            Self::Genres => "genres",
            Self::ProductionCountriesRegions => "production_countries_regions",
            Self::InitialReleaseDate => "initial_release_date",
        }
    }

    fn slot(&self) -> usize {
        *self as usize
    }
}

/// Raw value produced by an extraction strategy
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldValue {
    #[default]
    Absent,
    Single(String),
    Many(Vec<String>),
}

impl FieldValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// Mapping of every recognized field to its extracted value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractedFields {
    values: [FieldValue; 7],
}

impl ExtractedFields {
    /// All fields absent
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: Field) -> &FieldValue {
        &self.values[field.slot()]
    }

    pub fn set(&mut self, field: Field, value: FieldValue) {
        self.values[field.slot()] = value;
    }

    /// Iterates over all fields in column order
    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        Field::ALL.into_iter().map(move |field| (field, self.get(field)))
    }

    /// Number of fields that hold a value
    pub fn present_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_absent()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_follow_all_order() {
        for (i, field) in Field::ALL.iter().enumerate() {
            assert_eq!(field.slot(), i);
        }
    }

    #[test]
    fn test_new_has_every_key_absent() {
        let fields = ExtractedFields::new();
        let keys: Vec<Field> = fields.iter().map(|(f, _)| f).collect();
        assert_eq!(keys, Field::ALL.to_vec());
        assert!(fields.iter().all(|(_, v)| v.is_absent()));
        assert_eq!(fields.present_count(), 0);
    }

    #[test]
    fn test_set_and_get() {
        let mut fields = ExtractedFields::new();
        fields.set(Field::Genres, FieldValue::Many(vec!["剧情".into()]));
        fields.set(Field::InitialReleaseDate, FieldValue::Single("2021-01".into()));

        assert_eq!(
            fields.get(Field::Genres),
            &FieldValue::Many(vec!["剧情".to_string()])
        );
        assert_eq!(fields.present_count(), 2);
        assert!(fields.get(Field::Directors).is_absent());
    }
}
