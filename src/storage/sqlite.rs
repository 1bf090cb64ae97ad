//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the RecordStore trait.
//! Uniqueness is delegated to a UNIQUE index on the natural-key columns, so a
//! conflicting insert is rejected atomically by SQLite itself.

use crate::storage::schema::{initialize_schema, reset_records};
use crate::storage::traits::{RecordStore, StorageError, StorageResult};
use crate::storage::{CrawlStats, InsertOutcome, NaturalKey, Record, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;

const RECORD_COLUMNS: &str = "title, rate, url, rating_people, directors, script_writers, actors,
     genres, production_countries_regions, initial_release_date";

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status, pages, stubs,
     inserted, duplicates, fetch_failures, invalid_entries";

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
    natural_key: NaturalKey,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `natural_key` - Columns that identify a record
    pub fn open(path: &Path, natural_key: NaturalKey) -> StorageResult<Self> {
        let conn = connect(path)?;
        initialize_schema(&conn, natural_key)?;
        Ok(Self { conn, natural_key })
    }

    /// Opens or creates the database at `path` with the records table emptied
    ///
    /// Records are dropped before the natural-key index is built, so this also
    /// recovers a database whose rows conflict with `natural_key`. Run history
    /// is kept.
    pub fn open_fresh(path: &Path, natural_key: NaturalKey) -> StorageResult<Self> {
        let conn = connect(path)?;
        reset_records(&conn, natural_key)?;
        Ok(Self { conn, natural_key })
    }

    /// Creates an in-memory database
    pub fn open_in_memory(natural_key: NaturalKey) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn, natural_key)?;
        Ok(Self { conn, natural_key })
    }
}

fn connect(path: &Path) -> StorageResult<Connection> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;
    ",
    )?;

    Ok(conn)
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        title: row.get(0)?,
        rating_score: row.get(1)?,
        detail_url: row.get(2)?,
        rating_people_count: row.get(3)?,
        directors: row.get(4)?,
        script_writers: row.get(5)?,
        actors: row.get(6)?,
        genres: row.get(7)?,
        production_countries_regions: row.get(8)?,
        initial_release_date: row.get(9)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Failed),
        stats: CrawlStats {
            pages: row.get(5)?,
            stubs: row.get(6)?,
            inserted: row.get(7)?,
            duplicates: row.get(8)?,
            fetch_failures: row.get(9)?,
            invalid_entries: row.get(10)?,
        },
    })
}

/// Returns true if `err` is a UNIQUE constraint failure
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}

impl RecordStore for SqliteStore {
    // ===== Records =====

    fn natural_key(&self) -> NaturalKey {
        self.natural_key
    }

    fn insert(&mut self, record: Record) -> StorageResult<InsertOutcome> {
        let now = Utc::now().to_rfc3339();
        let result = self.conn.execute(
            &format!(
                "INSERT INTO records ({}, harvested_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                RECORD_COLUMNS
            ),
            params![
                record.title,
                record.rating_score,
                record.detail_url,
                record.rating_people_count,
                record.directors,
                record.script_writers,
                record.actors,
                record.genres,
                record.production_countries_regions,
                record.initial_release_date,
                now
            ],
        );

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::DuplicateKey),
            Err(e) => Err(e.into()),
        }
    }

    fn find(&self, title: &str, initial_release_date: &str) -> StorageResult<Option<Record>> {
        let record = match self.natural_key {
            NaturalKey::Title => self
                .conn
                .query_row(
                    &format!("SELECT {} FROM records WHERE title = ?1", RECORD_COLUMNS),
                    params![title],
                    record_from_row,
                )
                .optional()?,
            NaturalKey::TitleAndReleaseDate => self
                .conn
                .query_row(
                    &format!(
                        "SELECT {} FROM records WHERE title = ?1 AND initial_release_date = ?2",
                        RECORD_COLUMNS
                    ),
                    params![title, initial_release_date],
                    record_from_row,
                )
                .optional()?,
        };

        Ok(record)
    }

    fn count_records(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        stats: &CrawlStats,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, pages = ?3, stubs = ?4,
             inserted = ?5, duplicates = ?6, fetch_failures = ?7, invalid_entries = ?8
             WHERE id = ?9",
            params![
                status.to_db_string(),
                now,
                stats.pages,
                stats.stubs,
                stats.inserted,
                stats.duplicates,
                stats.fetch_failures,
                stats.invalid_entries,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(title: &str, date: &str) -> Record {
        Record {
            title: title.to_string(),
            rating_score: Some(8.7),
            detail_url: format!("https://movie.test/subject/{}/", title.len()),
            rating_people_count: "12345".to_string(),
            directors: r#"["孔笙"]"#.to_string(),
            script_writers: String::new(),
            actors: r#"["黄轩","张嘉益"]"#.to_string(),
            genres: r#"["剧情"]"#.to_string(),
            production_countries_regions: "中国大陆".to_string(),
            initial_release_date: date.to_string(),
        }
    }

    #[test]
    fn test_create_in_memory() {
        assert!(SqliteStore::open_in_memory(NaturalKey::default()).is_ok());
    }

    #[test]
    fn test_insert_and_find() {
        let mut store = SqliteStore::open_in_memory(NaturalKey::TitleAndReleaseDate).unwrap();
        let record = sample_record("山海情", "2021-01-12");

        assert_eq!(
            store.insert(record.clone()).unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(store.find("山海情", "2021-01-12").unwrap(), Some(record));
        assert_eq!(store.find("山海情", "2020-01-01").unwrap(), None);
    }

    #[test]
    fn test_duplicate_insert_is_absorbed() {
        let mut store = SqliteStore::open_in_memory(NaturalKey::TitleAndReleaseDate).unwrap();
        let first = sample_record("觉醒年代", "2021-02-01");
        let mut second = first.clone();
        second.rating_score = Some(1.0);
        second.actors = "changed".to_string();

        assert_eq!(store.insert(first.clone()).unwrap(), InsertOutcome::Inserted);
        assert_eq!(store.insert(second).unwrap(), InsertOutcome::DuplicateKey);

        assert_eq!(store.count_records().unwrap(), 1);
        assert_eq!(store.find("觉醒年代", "2021-02-01").unwrap(), Some(first));
    }

    #[test]
    fn test_richer_key_allows_same_title_different_date() {
        let mut store = SqliteStore::open_in_memory(NaturalKey::TitleAndReleaseDate).unwrap();
        store.insert(sample_record("红楼梦", "1987-05")).unwrap();
        let outcome = store.insert(sample_record("红楼梦", "2010-09-05")).unwrap();

        assert_eq!(outcome, InsertOutcome::Inserted);
        assert_eq!(store.count_records().unwrap(), 2);
    }

    #[test]
    fn test_title_key_rejects_same_title_different_date() {
        let mut store = SqliteStore::open_in_memory(NaturalKey::Title).unwrap();
        store.insert(sample_record("红楼梦", "1987-05")).unwrap();
        let outcome = store.insert(sample_record("红楼梦", "2010-09-05")).unwrap();

        assert_eq!(outcome, InsertOutcome::DuplicateKey);
        assert_eq!(store.count_records().unwrap(), 1);
        assert_eq!(
            store.find("红楼梦", "").unwrap().unwrap().initial_release_date,
            "1987-05"
        );
    }

    #[test]
    fn test_open_fresh_drops_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");

        let mut store = SqliteStore::open(&path, NaturalKey::default()).unwrap();
        store.insert(sample_record("A", "2020-01")).unwrap();
        drop(store);

        let mut store = SqliteStore::open_fresh(&path, NaturalKey::default()).unwrap();
        assert_eq!(store.count_records().unwrap(), 0);
        assert_eq!(
            store.insert(sample_record("A", "2020-01")).unwrap(),
            InsertOutcome::Inserted
        );
    }

    #[test]
    fn test_reopen_with_richer_key_drops_title_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");

        let mut store = SqliteStore::open(&path, NaturalKey::Title).unwrap();
        store.insert(sample_record("红楼梦", "1987-05")).unwrap();
        drop(store);

        let mut store = SqliteStore::open(&path, NaturalKey::TitleAndReleaseDate).unwrap();
        assert_eq!(
            store.insert(sample_record("红楼梦", "2010-09-05")).unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            store.insert(sample_record("红楼梦", "2010-09-05")).unwrap(),
            InsertOutcome::DuplicateKey
        );
        assert_eq!(store.count_records().unwrap(), 2);
    }

    #[test]
    fn test_reopen_with_title_key_refuses_conflicting_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");

        let mut store = SqliteStore::open(&path, NaturalKey::TitleAndReleaseDate).unwrap();
        store.insert(sample_record("红楼梦", "1987-05")).unwrap();
        store.insert(sample_record("红楼梦", "2010-09-05")).unwrap();
        drop(store);

        let err = SqliteStore::open(&path, NaturalKey::Title)
            .err()
            .expect("conflicting rows should be refused");
        assert!(matches!(
            err,
            StorageError::NaturalKeyConflict {
                key: "title",
                conflicts: 1
            }
        ));
        assert!(err.to_string().contains("--fresh"));

        // The old key still works after the refusal
        let store = SqliteStore::open(&path, NaturalKey::TitleAndReleaseDate).unwrap();
        assert_eq!(store.count_records().unwrap(), 2);
    }

    #[test]
    fn test_open_fresh_recovers_conflicting_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");

        let mut store = SqliteStore::open(&path, NaturalKey::TitleAndReleaseDate).unwrap();
        store.insert(sample_record("红楼梦", "1987-05")).unwrap();
        store.insert(sample_record("红楼梦", "2010-09-05")).unwrap();
        let run_id = store.create_run("hash").unwrap();
        drop(store);

        let mut store = SqliteStore::open_fresh(&path, NaturalKey::Title).unwrap();
        assert_eq!(store.count_records().unwrap(), 0);
        assert!(store.get_run(run_id).is_ok());

        store.insert(sample_record("红楼梦", "1987-05")).unwrap();
        assert_eq!(
            store.insert(sample_record("红楼梦", "2010-09-05")).unwrap(),
            InsertOutcome::DuplicateKey
        );
    }

    #[test]
    fn test_unrated_record_round_trips() {
        let mut store = SqliteStore::open_in_memory(NaturalKey::default()).unwrap();
        let mut record = sample_record("新剧", "2026-01-01");
        record.rating_score = None;

        store.insert(record.clone()).unwrap();
        assert_eq!(store.find("新剧", "2026-01-01").unwrap(), Some(record));
    }

    #[test]
    fn test_run_lifecycle() {
        let mut store = SqliteStore::open_in_memory(NaturalKey::default()).unwrap();
        let run_id = store.create_run("abc123").unwrap();
        assert!(run_id > 0);

        let running = store.get_run(run_id).unwrap();
        assert_eq!(running.status, RunStatus::Running);
        assert!(running.finished_at.is_none());

        let stats = CrawlStats {
            pages: 2,
            stubs: 23,
            inserted: 21,
            duplicates: 1,
            fetch_failures: 1,
            invalid_entries: 0,
        };
        store.finish_run(run_id, RunStatus::Completed, &stats).unwrap();

        let latest = store.get_latest_run().unwrap().unwrap();
        assert_eq!(latest.id, run_id);
        assert_eq!(latest.status, RunStatus::Completed);
        assert_eq!(latest.stats, stats);
        assert_eq!(latest.config_hash, "abc123");
        assert!(latest.finished_at.is_some());
    }

    #[test]
    fn test_finish_unknown_run() {
        let mut store = SqliteStore::open_in_memory(NaturalKey::default()).unwrap();
        let err = store
            .finish_run(99, RunStatus::Failed, &CrawlStats::default())
            .unwrap_err();
        assert!(matches!(err, StorageError::RunNotFound(99)));
        assert!(matches!(
            store.get_run(99).unwrap_err(),
            StorageError::RunNotFound(99)
        ));
    }
}
