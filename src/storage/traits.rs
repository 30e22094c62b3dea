//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::crawler::{DetailRecord, Task};
use crate::state::RequestState;
use crate::storage::{RequestRecord, RunRecord, RunStatus, StoredRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Covers the three concerns the crawler persists: runs, the request queue
/// (for resumption and per-URL diagnostics) and the record sink.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run in the `running` state
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    /// * `target_region` - Region the run crawls
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str, target_region: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run, stamping the finish time unless it is
    /// still running
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as completed with a finish timestamp
    fn complete_run(&mut self, run_id: i64) -> StorageResult<()> {
        self.update_run_status(run_id, RunStatus::Completed)
    }

    // ===== Request Queue =====

    /// Records a newly enqueued task as pending
    ///
    /// Returns false if the URL is already known.
    fn add_request(&mut self, task: &Task) -> StorageResult<bool>;

    /// Sets the final state of a request
    fn mark_request(
        &mut self,
        url: &str,
        state: RequestState,
        error_message: Option<&str>,
    ) -> StorageResult<()>;

    /// Increments the retry count of a request
    fn increment_retry_count(&mut self, url: &str) -> StorageResult<()>;

    /// Gets all requests in a state, in insertion order
    fn load_requests(&self, state: RequestState) -> StorageResult<Vec<RequestRecord>>;

    /// Gets every known request URL
    fn load_request_urls(&self) -> StorageResult<Vec<String>>;

    /// Removes every request
    fn clear_requests(&mut self) -> StorageResult<()>;

    /// Counts requests in a state
    fn count_requests_by_state(&self, state: RequestState) -> StorageResult<u64>;

    /// Applies a successfully handled page atomically
    ///
    /// Inserts the `discovered` tasks as pending, appends `record` if any
    /// and marks `url` handled. On error nothing is written and `url` stays
    /// pending, so a resumed run handles the page again.
    ///
    /// # Returns
    ///
    /// The number of discovered tasks that were not already known
    fn commit_handled(
        &mut self,
        run_id: i64,
        url: &str,
        discovered: &[Task],
        record: Option<&DetailRecord>,
    ) -> StorageResult<usize>;

    // ===== Record Sink =====

    /// Counts stored records, of one run or of all runs
    fn count_records(&self, run_id: Option<i64>) -> StorageResult<u64>;

    /// Loads stored records in insertion order, of one run or of all runs
    fn load_records(&self, run_id: Option<i64>) -> StorageResult<Vec<StoredRecord>>;
}
