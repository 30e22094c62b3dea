//! Statistics generation from crawl database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::state::RequestState;
use crate::storage::{RunRecord, Storage};
use crate::DirectoryError;
use std::collections::HashMap;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,

    /// Count of known requests by state
    pub requests_by_state: HashMap<RequestState, u64>,

    /// Total number of known requests
    pub total_requests: u64,

    /// Records stored by the most recent run
    pub run_records: u64,

    /// Records stored across all runs
    pub total_records: u64,
}

impl CrawlStatistics {
    /// Share of finished requests that were handled, in percent
    pub fn success_rate(&self) -> f64 {
        let handled = self.count(RequestState::Handled);
        let finished = handled + self.count(RequestState::Failed);
        if finished == 0 {
            0.0
        } else {
            handled as f64 / finished as f64 * 100.0
        }
    }

    pub fn count(&self, state: RequestState) -> u64 {
        self.requests_by_state.get(&state).copied().unwrap_or(0)
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(DirectoryError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<CrawlStatistics, DirectoryError> {
    let latest_run = storage.get_latest_run()?;

    let mut requests_by_state = HashMap::new();
    for state in RequestState::all_states() {
        requests_by_state.insert(state, storage.count_requests_by_state(state)?);
    }
    let total_requests = requests_by_state.values().sum();

    let run_records = match &latest_run {
        Some(run) => storage.count_records(Some(run.id))?,
        None => 0,
    };
    let total_records = storage.count_records(None)?;

    Ok(CrawlStatistics {
        latest_run,
        requests_by_state,
        total_requests,
        run_records,
        total_records,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run:");
            println!("  ID: {}", run.id);
            println!("  Region: {}", run.target_region);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            println!(
                "  Finished: {}",
                run.finished_at.as_deref().unwrap_or("-")
            );
            println!("  Config hash: {}", run.config_hash);
        }
        None => println!("No crawl runs found"),
    }
    println!();

    println!("Requests by State:");
    for state in RequestState::all_states() {
        let count = stats.count(state);
        let percentage = if stats.total_requests > 0 {
            (count as f64 / stats.total_requests as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", state, count, percentage);
    }
    println!("  Total: {}", stats.total_requests);
    println!();

    println!("Records:");
    println!("  Latest run: {}", stats.run_records);
    println!("  All runs: {}", stats.total_records);
    println!();

    println!(
        "Success Rate: {:.1}% ({} handled, {} failed)",
        stats.success_rate(),
        stats.count(RequestState::Handled),
        stats.count(RequestState::Failed)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{DetailRecord, Label, Task};
    use crate::storage::SqliteStorage;
    use url::Url;

    #[test]
    fn test_load_statistics() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("hash", "Texas").unwrap();

        for (i, state) in [
            RequestState::Handled,
            RequestState::Handled,
            RequestState::Handled,
            RequestState::Failed,
            RequestState::Pending,
        ]
        .into_iter()
        .enumerate()
        {
            let task = Task::new(
                Url::parse(&format!("https://example.com/pub/{}", i)).unwrap(),
                Label::Detail,
            );
            storage.add_request(&task).unwrap();
            storage.mark_request(task.key(), state, None).unwrap();
        }
        storage
            .commit_handled(
                run_id,
                "https://example.com/pub/extra",
                &[],
                Some(&DetailRecord::default()),
            )
            .unwrap();

        let stats = load_statistics(&storage).unwrap();
        assert_eq!(stats.latest_run.as_ref().unwrap().id, run_id);
        assert_eq!(stats.total_requests, 5);
        assert_eq!(stats.count(RequestState::Handled), 3);
        assert_eq!(stats.run_records, 1);
        assert_eq!(stats.total_records, 1);
        assert!((stats.success_rate() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_database() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let stats = load_statistics(&storage).unwrap();

        assert!(stats.latest_run.is_none());
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.success_rate(), 0.0);
    }
}
