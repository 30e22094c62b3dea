//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::crawler::{DetailRecord, Label, Task};
use crate::state::RequestState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RequestRecord, RunRecord, RunStatus, StoredRecord};
use crate::DirectoryError;
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) a database file and initializes the schema
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(DirectoryError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, DirectoryError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, DirectoryError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, target_region, status";
const REQUEST_COLUMNS: &str =
    "url, label, page_index, state, retry_count, error_message, updated_at";

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        target_region: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Running),
    })
}

/// Maps a request row; an unknown label or state fails the row with
/// `FromSqlConversionFailure`
fn request_from_row(row: &Row<'_>) -> rusqlite::Result<RequestRecord> {
    let label = match row.get::<_, Option<String>>(1)? {
        Some(raw) => Some(
            Label::from_db_string(&raw).ok_or_else(|| corrupt_column(1, "label", &raw))?,
        ),
        None => None,
    };
    let raw_state: String = row.get(3)?;
    let state = RequestState::from_db_string(&raw_state)
        .ok_or_else(|| corrupt_column(3, "state", &raw_state))?;

    Ok(RequestRecord {
        url: row.get(0)?,
        label,
        page_index: row.get(2)?,
        state,
        retry_count: row.get(4)?,
        error_message: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn corrupt_column(index: usize, column: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        Type::Text,
        format!("unknown {} '{}'", column, value).into(),
    )
}

fn insert_request(conn: &Connection, task: &Task, now: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT OR IGNORE INTO requests (url, label, page_index, state, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            task.key(),
            task.label.map(|label| label.to_db_string()),
            task.page_index,
            RequestState::Pending.to_db_string(),
            now
        ],
    )
}

fn insert_record(
    conn: &Connection,
    run_id: i64,
    url: &str,
    record: &DetailRecord,
    now: &str,
) -> StorageResult<()> {
    let data = serde_json::to_string(record)?;
    conn.execute(
        "INSERT INTO records (run_id, url, data, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![run_id, url, data, now],
    )?;
    Ok(())
}

fn update_request(
    conn: &Connection,
    url: &str,
    state: RequestState,
    error_message: Option<&str>,
    now: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE requests SET state = ?1, error_message = ?2, updated_at = ?3 WHERE url = ?4",
        params![state.to_db_string(), error_message, now, url],
    )
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str, target_region: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, target_region, status)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                now,
                config_hash,
                target_region,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
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

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let finished_at = match status {
            RunStatus::Running => None,
            _ => Some(Utc::now().to_rfc3339()),
        };
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), finished_at, run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Request Queue =====

    fn add_request(&mut self, task: &Task) -> StorageResult<bool> {
        let now = Utc::now().to_rfc3339();
        let inserted = insert_request(&self.conn, task, &now)?;
        Ok(inserted > 0)
    }

    fn mark_request(
        &mut self,
        url: &str,
        state: RequestState,
        error_message: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        update_request(&self.conn, url, state, error_message, &now)?;
        Ok(())
    }

    fn increment_retry_count(&mut self, url: &str) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE requests SET retry_count = retry_count + 1 WHERE url = ?1",
            params![url],
        )?;
        Ok(())
    }

    fn load_requests(&self, state: RequestState) -> StorageResult<Vec<RequestRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM requests WHERE state = ?1 ORDER BY rowid",
            REQUEST_COLUMNS
        ))?;

        let mut requests = Vec::new();
        for row in stmt.query_map(params![state.to_db_string()], request_from_row)? {
            match row {
                Ok(request) => requests.push(request),
                Err(rusqlite::Error::FromSqlConversionFailure(_, _, reason)) => {
                    tracing::warn!("Skipping corrupt request row: {}", reason);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(requests)
    }

    fn load_request_urls(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT url FROM requests")?;
        let urls = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(urls)
    }

    fn clear_requests(&mut self) -> StorageResult<()> {
        self.conn.execute("DELETE FROM requests", [])?;
        Ok(())
    }

    fn commit_handled(
        &mut self,
        run_id: i64,
        url: &str,
        discovered: &[Task],
        record: Option<&DetailRecord>,
    ) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        let mut inserted = 0;
        for task in discovered {
            inserted += insert_request(&tx, task, &now)?;
        }
        if let Some(record) = record {
            insert_record(&tx, run_id, url, record, &now)?;
        }
        update_request(&tx, url, RequestState::Handled, None, &now)?;

        tx.commit()?;
        Ok(inserted)
    }

    fn count_requests_by_state(&self, state: RequestState) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM requests WHERE state = ?1",
            params![state.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Record Sink =====

    fn count_records(&self, run_id: Option<i64>) -> StorageResult<u64> {
        let count: i64 = match run_id {
            Some(run_id) => self.conn.query_row(
                "SELECT COUNT(*) FROM records WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?,
        };
        Ok(count as u64)
    }

    fn load_records(&self, run_id: Option<i64>) -> StorageResult<Vec<StoredRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, url, data, created_at FROM records
             WHERE ?1 IS NULL OR run_id = ?1
             ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, run_id, url, data, created_at)| -> StorageResult<StoredRecord> {
                Ok(StoredRecord {
                    id,
                    run_id,
                    url,
                    data: serde_json::from_str(&data)?,
                    created_at,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn task(url: &str, label: Label) -> Task {
        Task::new(Url::parse(url).unwrap(), label)
    }

    #[test]
    fn test_create_in_memory() {
        let storage = SqliteStorage::new_in_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_run_lifecycle() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("test_hash", "Texas").unwrap();
        assert!(run_id > 0);

        let latest = storage.get_latest_run().unwrap().unwrap();
        assert_eq!(latest.id, run_id);
        assert_eq!(latest.status, RunStatus::Running);
        assert_eq!(latest.target_region, "Texas");
        assert!(latest.finished_at.is_none());

        storage.complete_run(run_id).unwrap();
        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_missing_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert!(matches!(
            storage.get_run(42),
            Err(StorageError::RunNotFound(42))
        ));
        assert!(matches!(
            storage.update_run_status(42, RunStatus::Failed),
            Err(StorageError::RunNotFound(42))
        ));
        assert!(storage.get_latest_run().unwrap().is_none());
    }

    #[test]
    fn test_add_request_is_idempotent() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let t = task("https://example.com/pub/a", Label::Detail);

        assert!(storage.add_request(&t).unwrap());
        assert!(!storage.add_request(&t).unwrap());
        assert_eq!(
            storage.count_requests_by_state(RequestState::Pending).unwrap(),
            1
        );
    }

    #[test]
    fn test_request_state_transitions() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut listing = task("https://example.com/directory/md/state/texas", Label::Region);
        listing.page_index = 3;
        storage.add_request(&listing).unwrap();
        storage
            .add_request(&Task::seed(
                Url::parse("https://example.com/directory/md").unwrap(),
            ))
            .unwrap();

        storage
            .mark_request(listing.key(), RequestState::Failed, Some("HTTP 503"))
            .unwrap();
        storage.increment_retry_count(listing.key()).unwrap();

        let failed = storage.load_requests(RequestState::Failed).unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].label, Some(Label::Region));
        assert_eq!(failed[0].page_index, 3);
        assert_eq!(failed[0].retry_count, 1);
        assert_eq!(failed[0].error_message.as_deref(), Some("HTTP 503"));

        let pending = storage.load_requests(RequestState::Pending).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].label, None);

        assert_eq!(storage.load_request_urls().unwrap().len(), 2);
        storage.clear_requests().unwrap();
        assert!(storage.load_request_urls().unwrap().is_empty());
    }

    #[test]
    fn test_push_and_load_records() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let first_run = storage.create_run("h", "Texas").unwrap();
        let second_run = storage.create_run("h", "Ohio").unwrap();

        let record = DetailRecord {
            first_name: Some("Jane".to_string()),
            licenses: vec!["TX, 2030".to_string()],
            ..DetailRecord::default()
        };
        storage
            .commit_handled(first_run, "https://example.com/pub/jane", &[], Some(&record))
            .unwrap();
        storage
            .commit_handled(
                second_run,
                "https://example.com/pub/sam",
                &[],
                Some(&DetailRecord::default()),
            )
            .unwrap();

        assert_eq!(storage.count_records(None).unwrap(), 2);
        assert_eq!(storage.count_records(Some(first_run)).unwrap(), 1);

        let loaded = storage.load_records(Some(first_run)).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].url, "https://example.com/pub/jane");
        assert_eq!(loaded[0].data, record);

        let all = storage.load_records(None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].run_id, second_run);
    }

    #[test]
    fn test_commit_handled_applies_page() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("h", "Texas").unwrap();
        let listing = task("https://example.com/directory/md/location/austin-tx", Label::SubRegion);
        let known = task("https://example.com/pub/jane", Label::Detail);
        storage.add_request(&listing).unwrap();
        storage.add_request(&known).unwrap();

        let discovered = vec![known, task("https://example.com/pub/sam", Label::Detail)];
        let inserted = storage
            .commit_handled(run_id, listing.key(), &discovered, None)
            .unwrap();
        assert_eq!(inserted, 1);

        let handled = storage.load_requests(RequestState::Handled).unwrap();
        assert_eq!(handled.len(), 1);
        assert_eq!(handled[0].url, listing.key());
        assert_eq!(
            storage.count_requests_by_state(RequestState::Pending).unwrap(),
            2
        );

        let jane = task("https://example.com/pub/jane", Label::Detail);
        let record = DetailRecord {
            first_name: Some("Jane".to_string()),
            ..DetailRecord::default()
        };
        storage
            .commit_handled(run_id, jane.key(), &[], Some(&record))
            .unwrap();
        assert_eq!(storage.load_records(Some(run_id)).unwrap()[0].data, record);
    }

    #[test]
    fn test_commit_handled_is_all_or_nothing() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let page = task("https://example.com/pub/jane", Label::Detail);
        storage.add_request(&page).unwrap();

        // No such run: the record insert violates the foreign key
        let discovered = vec![task("https://example.com/pub/sam", Label::Detail)];
        let result =
            storage.commit_handled(999, page.key(), &discovered, Some(&DetailRecord::default()));
        assert!(result.is_err());

        let pending = storage.load_requests(RequestState::Pending).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].url, page.key());
        assert_eq!(storage.count_records(None).unwrap(), 0);
    }

    #[test]
    fn test_corrupt_request_rows_are_skipped() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let good = task("https://example.com/pub/jane", Label::Detail);
        storage.add_request(&good).unwrap();
        storage
            .conn
            .execute(
                "INSERT INTO requests (url, label, page_index, state, updated_at)
                 VALUES ('https://example.com/pub/odd', 'Bogus', 0, 'pending', 'now')",
                [],
            )
            .unwrap();

        let pending = storage.load_requests(RequestState::Pending).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].url, good.key());
        assert_eq!(pending[0].label, Some(Label::Detail));
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("md.db");

        {
            let mut storage = SqliteStorage::new(&path).unwrap();
            storage.create_run("h", "Texas").unwrap();
        }

        let storage = SqliteStorage::new(&path).unwrap();
        assert_eq!(storage.get_latest_run().unwrap().unwrap().target_region, "Texas");
    }
}
