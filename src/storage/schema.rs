//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Tagsweep database.

use crate::storage::traits::{StorageError, StorageResult};
use crate::storage::NaturalKey;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    pages INTEGER NOT NULL DEFAULT 0,
    stubs INTEGER NOT NULL DEFAULT 0,
    inserted INTEGER NOT NULL DEFAULT 0,
    duplicates INTEGER NOT NULL DEFAULT 0,
    fetch_failures INTEGER NOT NULL DEFAULT 0,
    invalid_entries INTEGER NOT NULL DEFAULT 0
);

-- Harvested records, one per natural key
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    rate REAL,
    url TEXT NOT NULL,
    rating_people TEXT NOT NULL DEFAULT '',
    directors TEXT NOT NULL DEFAULT '',
    script_writers TEXT NOT NULL DEFAULT '',
    actors TEXT NOT NULL DEFAULT '',
    genres TEXT NOT NULL DEFAULT '',
    production_countries_regions TEXT NOT NULL DEFAULT '',
    initial_release_date TEXT NOT NULL DEFAULT '',
    harvested_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_title ON records(title);
CREATE INDEX IF NOT EXISTS idx_records_release ON records(initial_release_date);
"#;

/// Name of the unique index backing a natural key
pub fn natural_key_index(key: NaturalKey) -> &'static str {
    match key {
        NaturalKey::Title => "uq_records_title",
        NaturalKey::TitleAndReleaseDate => "uq_records_title_release",
    }
}

/// SQL creating the unique index for `key`
pub fn natural_key_sql(key: NaturalKey) -> String {
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON records({});",
        natural_key_index(key),
        key.columns().join(", ")
    )
}

/// Initializes the database schema, including the natural-key index
pub fn initialize_schema(conn: &rusqlite::Connection, key: NaturalKey) -> StorageResult<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    apply_natural_key(conn, key)
}

/// Makes `key` the only enforced natural key
///
/// Fails without touching any index if stored records already share a value
/// of `key`.
pub fn apply_natural_key(conn: &rusqlite::Connection, key: NaturalKey) -> StorageResult<()> {
    let conflicts = count_key_conflicts(conn, key)?;
    if conflicts > 0 {
        return Err(StorageError::NaturalKeyConflict {
            key: key.name(),
            conflicts,
        });
    }

    for other in NaturalKey::ALL.into_iter().filter(|k| *k != key) {
        conn.execute_batch(&format!("DROP INDEX IF EXISTS {};", natural_key_index(other)))?;
    }
    conn.execute_batch(&natural_key_sql(key))?;
    Ok(())
}

/// Number of value groups that occur more than once under `key`
fn count_key_conflicts(conn: &rusqlite::Connection, key: NaturalKey) -> StorageResult<u64> {
    let count: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM (SELECT 1 FROM records GROUP BY {} HAVING COUNT(*) > 1)",
            key.columns().join(", ")
        ),
        [],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}

/// Drops and recreates the records table
pub fn reset_records(conn: &rusqlite::Connection, key: NaturalKey) -> StorageResult<()> {
    conn.execute_batch("DROP TABLE IF EXISTS records;")?;
    initialize_schema(conn, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(initialize_schema(&conn, NaturalKey::default()).is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn, NaturalKey::Title).unwrap();
        assert!(initialize_schema(&conn, NaturalKey::Title).is_ok());
    }

    #[test]
    fn test_natural_key_sql() {
        assert_eq!(
            natural_key_sql(NaturalKey::TitleAndReleaseDate),
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_records_title_release ON records(title, initial_release_date);"
        );
    }

    fn index_exists(conn: &Connection, name: &str) -> bool {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?1",
                [name],
                |row| row.get(0),
            )
            .unwrap();
        count == 1
    }

    fn insert_title(conn: &Connection, title: &str, date: &str) {
        conn.execute(
            "INSERT INTO records (title, url, initial_release_date, harvested_at)
             VALUES (?1, 'u', ?2, 'now')",
            [title, date],
        )
        .unwrap();
    }

    #[test]
    fn test_switching_key_replaces_unique_index() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn, NaturalKey::Title).unwrap();
        insert_title(&conn, "红楼梦", "1987-02-01");

        initialize_schema(&conn, NaturalKey::TitleAndReleaseDate).unwrap();
        assert!(index_exists(&conn, "uq_records_title_release"));
        assert!(!index_exists(&conn, "uq_records_title"));

        insert_title(&conn, "红楼梦", "2010-09-05");
    }

    #[test]
    fn test_conflicting_rows_block_key_change() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn, NaturalKey::TitleAndReleaseDate).unwrap();
        insert_title(&conn, "红楼梦", "1987-02-01");
        insert_title(&conn, "红楼梦", "2010-09-05");

        let err = apply_natural_key(&conn, NaturalKey::Title).unwrap_err();
        assert!(matches!(
            err,
            StorageError::NaturalKeyConflict {
                key: "title",
                conflicts: 1
            }
        ));
        // Nothing changed
        assert!(index_exists(&conn, "uq_records_title_release"));
        assert!(!index_exists(&conn, "uq_records_title"));

        reset_records(&conn, NaturalKey::Title).unwrap();
        assert!(index_exists(&conn, "uq_records_title"));
        assert!(!index_exists(&conn, "uq_records_title_release"));
    }

    #[test]
    fn test_tables_and_index_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn, NaturalKey::TitleAndReleaseDate).unwrap();

        for (kind, name) in [
            ("table", "runs"),
            ("table", "records"),
            ("index", "uq_records_title_release"),
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
                    [kind, name],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "{} {} should exist", kind, name);
        }
    }
}
