//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl supervisor, which coordinates:
//! - Opening storage and creating or resuming a run
//! - Seeding the frontier
//! - Dispatching tasks to workers under a concurrency bound
//! - Turning every task into an `Outcome` and applying it
//! - Marking the run completed or interrupted

use crate::config::Config;
use crate::crawler::fetcher::{fetch_page, FetchError};
use crate::crawler::frontier::{Frontier, InFlight};
use crate::crawler::outcome::Outcome;
use crate::crawler::proxy::ProxyConfiguration;
use crate::crawler::router::Router;
use crate::crawler::session::SessionPool;
use crate::crawler::task::Task;
use crate::state::RequestState;
use crate::storage::{RunRecord, RunStatus, SqliteStorage, Storage};
use crate::url::normalize_url;
use crate::DirectoryError;
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

const RETRY_INITIAL_INTERVAL: Duration = Duration::from_millis(500);
const RETRY_MAX_INTERVAL: Duration = Duration::from_secs(10);

/// Summary of one crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub run_id: i64,
    /// Tasks whose page was fetched and handled successfully
    pub handled: u64,
    /// Tasks whose page could not be fetched
    pub failed: u64,
    /// Tasks whose handler reported an extraction gap
    pub gaps: u64,
    /// Records written to the sink
    pub records: u64,
    /// Extra fetch attempts made after transport failures
    pub retries: u64,
    /// Whether the crawl stopped before the frontier drained
    pub interrupted: bool,
    pub elapsed: Duration,
}

#[derive(Default)]
struct CrawlCounters {
    handled: AtomicU64,
    failed: AtomicU64,
    gaps: AtomicU64,
    records: AtomicU64,
    retries: AtomicU64,
}

/// State shared by the supervisor and every worker
struct Shared {
    router: Router,
    frontier: Arc<Frontier>,
    sessions: Arc<SessionPool>,
    storage: Mutex<SqliteStorage>,
    run_id: i64,
    max_retries: u32,
    counters: CrawlCounters,
}

/// Crawl supervisor
pub struct Crawler {
    shared: Arc<Shared>,
    concurrency: usize,
}

impl Crawler {
    /// Opens the configured database and prepares a run
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `config_hash` - Hash of the configuration file, stored on new runs
    /// * `fresh` - Start a new run even if the latest one was interrupted
    pub fn new(config: &Config, config_hash: &str, fresh: bool) -> Result<Self, DirectoryError> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        Self::with_storage(config, storage, config_hash, fresh)
    }

    /// Prepares a run on an already opened database
    ///
    /// Without `fresh`, an interrupted latest run for the same target region
    /// is resumed: its pending requests are queued again and every URL it
    /// knew is marked seen. Otherwise the request queue is cleared and the
    /// seed URL is queued under a new run.
    pub fn with_storage(
        config: &Config,
        mut storage: SqliteStorage,
        config_hash: &str,
        fresh: bool,
    ) -> Result<Self, DirectoryError> {
        let proxy = ProxyConfiguration::from_input(&config.proxy)?;
        let sessions = Arc::new(SessionPool::new(
            config.sessions.clone(),
            Duration::from_secs(config.crawler.request_timeout_secs),
            proxy,
        ));
        tracing::info!("Egress: {}", sessions.proxy_description());

        let frontier = Arc::new(Frontier::new());

        let resumable = if fresh {
            None
        } else {
            storage
                .get_latest_run()?
                .filter(|run| resumes_with(run, config, config_hash))
        };

        let run_id = match resumable {
            Some(run) => {
                tracing::info!("Resuming run {} (started {})", run.id, run.started_at);
                storage.update_run_status(run.id, RunStatus::Running)?;

                let pending = storage.load_requests(RequestState::Pending)?;
                tracing::info!("Re-queuing {} pending request(s)", pending.len());
                for request in pending {
                    let url = Url::parse(&request.url)?;
                    frontier.enqueue(Task {
                        url,
                        label: request.label,
                        page_index: request.page_index,
                    });
                }

                for url in storage.load_request_urls()? {
                    frontier.mark_seen(&url);
                }

                run.id
            }
            None => {
                storage.clear_requests()?;
                let run_id = storage.create_run(config_hash, &config.input.target_region)?;
                tracing::info!(
                    "Starting run {} for region '{}'",
                    run_id,
                    config.input.target_region
                );

                let seed = Task::seed(normalize_url(&config.crawler.seed_url)?);
                if frontier.enqueue(seed.clone()) {
                    storage.add_request(&seed)?;
                }

                run_id
            }
        };

        let shared = Shared {
            router: Router::new(
                config.input.clone(),
                config.crawler.max_pages_per_listing,
            ),
            frontier,
            sessions,
            storage: Mutex::new(storage),
            run_id,
            max_retries: config.crawler.max_request_retries,
            counters: CrawlCounters::default(),
        };

        Ok(Self {
            shared: Arc::new(shared),
            concurrency: config.crawler.desired_concurrency.max(1) as usize,
        })
    }

    pub fn run_id(&self) -> i64 {
        self.shared.run_id
    }

    /// Marks the run failed after an aborted crawl
    pub fn mark_failed(&self) -> Result<(), DirectoryError> {
        self.shared
            .lock_storage()
            .update_run_status(self.shared.run_id, RunStatus::Failed)?;
        Ok(())
    }

    /// Number of tasks waiting in the frontier
    pub fn queued(&self) -> usize {
        self.shared.frontier.len()
    }

    /// Runs the crawl until the frontier drains or Ctrl-C is pressed
    pub async fn run(&self) -> Result<CrawlReport, DirectoryError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Runs the crawl until the frontier drains or `shutdown` resolves
    ///
    /// On shutdown no new task is dispatched; tasks already running are
    /// allowed to finish and the run is marked interrupted, so a later run
    /// resumes it.
    pub async fn run_until(
        &self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<CrawlReport, DirectoryError> {
        let start_time = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut workers = JoinSet::new();
        let mut interrupted = false;

        tracing::info!(
            "Crawling run {} with {} worker(s), {} task(s) queued",
            self.shared.run_id,
            self.concurrency,
            self.shared.frontier.len()
        );

        tokio::pin!(shutdown);

        loop {
            while let Some(joined) = workers.try_join_next() {
                log_worker_exit(joined);
            }

            let permit = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    interrupted = true;
                    break;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => {
                    permit.map_err(|e| DirectoryError::Session(e.to_string()))?
                }
            };

            let next = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    interrupted = true;
                    break;
                }
                next = self.shared.frontier.next() => next,
            };

            let Some(in_flight) = next else {
                tracing::info!("Frontier is empty, crawl complete");
                break;
            };

            let shared = Arc::clone(&self.shared);
            workers.spawn(async move {
                let _permit = permit;
                shared.process(in_flight).await;
            });

            let dispatched = self.shared.frontier.dispatched();
            if dispatched % 25 == 0 {
                let stats = self.shared.sessions.stats();
                tracing::info!(
                    "Progress: {} dispatched, {} queued, {} records, {} session(s) live",
                    dispatched,
                    self.shared.frontier.len(),
                    self.shared.counters.records.load(Ordering::Relaxed),
                    stats.idle + stats.leased
                );
            }
        }

        if interrupted {
            tracing::warn!(
                "Shutdown requested, waiting for {} running task(s)",
                workers.len()
            );
        }
        while let Some(joined) = workers.join_next().await {
            log_worker_exit(joined);
        }

        {
            let mut storage = self.shared.lock_storage();
            if interrupted {
                storage.update_run_status(self.shared.run_id, RunStatus::Interrupted)?;
            } else {
                storage.complete_run(self.shared.run_id)?;
            }
        }

        let counters = &self.shared.counters;
        let report = CrawlReport {
            run_id: self.shared.run_id,
            handled: counters.handled.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            gaps: counters.gaps.load(Ordering::Relaxed),
            records: counters.records.load(Ordering::Relaxed),
            retries: counters.retries.load(Ordering::Relaxed),
            interrupted,
            elapsed: start_time.elapsed(),
        };

        tracing::info!(
            "Run {} {}: {} handled, {} failed, {} extraction gap(s), {} record(s), {} retries in {:?}",
            report.run_id,
            if interrupted { "interrupted" } else { "completed" },
            report.handled,
            report.failed,
            report.gaps,
            report.records,
            report.retries,
            report.elapsed
        );

        Ok(report)
    }
}

impl Shared {
    /// Runs one task to its outcome and applies it
    ///
    /// The in-flight guard is released only after follow-up tasks are
    /// queued, so the frontier cannot drain early.
    async fn process(&self, in_flight: InFlight) {
        let task = in_flight.task();
        let outcome = self.execute(task).await;

        tracing::debug!("{} {} -> {}", task.stage(), task.url, outcome.kind());

        if let Err(e) = self.settle(task, outcome) {
            tracing::error!("Failed to record outcome of {}: {}", task.url, e);
        }
    }

    /// Fetches the page with a leased session and runs the stage handler
    async fn execute(&self, task: &Task) -> Outcome {
        let mut attempt = 0;
        let mut delays = retry_backoff();

        loop {
            let mut lease = match self.sessions.acquire().await {
                Ok(lease) => lease,
                Err(e) => {
                    tracing::error!("No session for {}: {}", task.url, e);
                    return Outcome::Transport(FetchError::Request {
                        url: task.url.to_string(),
                        message: e.to_string(),
                    });
                }
            };

            tracing::info!(
                stage = task.stage(),
                proxy = %lease.session().proxy_label(),
                session = lease.session().id(),
                "Processing {}",
                task.url
            );

            let fetched = fetch_page(lease.session().client(), &task.url).await;

            let error = match fetched {
                Ok(page) => {
                    lease.mark_good();
                    drop(lease);

                    return match self.router.dispatch(task, &page.body, &page.final_url) {
                        Ok(output) => Outcome::Success(output),
                        Err(gap) => {
                            tracing::warn!(
                                stage = task.stage(),
                                status = page.status,
                                "Extraction gap on {}: {}",
                                task.url,
                                gap
                            );
                            tracing::info!("http response body: {}", page.body);
                            Outcome::ExtractionGap(gap)
                        }
                    };
                }
                Err(error) => error,
            };

            if error.is_blocked() {
                tracing::warn!(
                    "Session {} blocked (HTTP {:?}), retiring it",
                    lease.session().id(),
                    error.status()
                );
                lease.retire();
            } else {
                lease.mark_bad();
            }
            drop(lease);

            if attempt >= self.max_retries || !error.is_retryable() {
                return Outcome::Transport(error);
            }

            attempt += 1;
            self.counters.retries.fetch_add(1, Ordering::Relaxed);
            let delay = delays.next_backoff().unwrap_or(RETRY_MAX_INTERVAL);
            tracing::warn!(
                "Retrying {} ({}/{}) in {:?} after: {}",
                task.url,
                attempt,
                self.max_retries,
                delay,
                error
            );
            if let Err(e) = self.lock_storage().increment_retry_count(task.key()) {
                tracing::warn!("Failed to record retry of {}: {}", task.url, e);
            }
            tokio::time::sleep(delay).await;
        }
    }

    /// Applies an outcome: queue follow-ups, store the record, record the
    /// request state
    fn settle(&self, task: &Task, outcome: Outcome) -> Result<(), DirectoryError> {
        match outcome {
            Outcome::Success(output) => {
                let discovered = output.enqueue.len();
                let candidates: Vec<Task> = output
                    .enqueue
                    .into_iter()
                    .filter_map(|next| self.unseen(next))
                    .collect();

                // Persisted before queuing, so a queued task always has a row
                self.lock_storage().commit_handled(
                    self.run_id,
                    task.key(),
                    &candidates,
                    output.record.as_ref(),
                )?;

                let queued = candidates
                    .into_iter()
                    .filter(|next| self.frontier.enqueue(next.clone()))
                    .count();
                if discovered > 0 {
                    tracing::debug!(
                        "{}: {} new of {} discovered task(s)",
                        task.url,
                        queued,
                        discovered
                    );
                }

                if let Some(record) = &output.record {
                    self.counters.records.fetch_add(1, Ordering::Relaxed);
                    tracing::info!("Stored record '{}' from {}", record.display_name(), task.url);
                }
                self.counters.handled.fetch_add(1, Ordering::Relaxed);
            }

            Outcome::ExtractionGap(gap) => {
                self.lock_storage().mark_request(
                    task.key(),
                    RequestState::Handled,
                    Some(&gap.to_string()),
                )?;
                self.counters.gaps.fetch_add(1, Ordering::Relaxed);
            }

            Outcome::Transport(error) => {
                tracing::error!(
                    stage = task.stage(),
                    status = ?error.status(),
                    "Failed to fetch {}: {}",
                    task.url,
                    error
                );
                if let Some(body) = error.body() {
                    tracing::info!("http response body: {}", body);
                }
                self.lock_storage().mark_request(
                    task.key(),
                    RequestState::Failed,
                    Some(&error.to_string()),
                )?;
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        Ok(())
    }

    /// Normalizes a discovered task; `None` if it is invalid or already known
    fn unseen(&self, task: Task) -> Option<Task> {
        let url = match normalize_url(task.url.as_str()) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Skipping {}: {}", task.url, e);
                return None;
            }
        };
        let task = Task { url, ..task };

        (!self.frontier.is_seen(task.key())).then_some(task)
    }

    fn lock_storage(&self) -> MutexGuard<'_, SqliteStorage> {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Whether the latest run can be picked up by a crawl with `config`
///
/// Only unfinished runs for the same target region are resumed.
fn resumes_with(run: &RunRecord, config: &Config, config_hash: &str) -> bool {
    if !matches!(run.status, RunStatus::Running | RunStatus::Interrupted) {
        return false;
    }

    if run.target_region != config.input.target_region {
        tracing::warn!(
            "Run {} was for region '{}', not '{}'; starting a new run",
            run.id,
            run.target_region,
            config.input.target_region
        );
        return false;
    }

    if run.config_hash != config_hash {
        tracing::warn!(
            "Configuration changed since run {} was started (hash {} -> {})",
            run.id,
            run.config_hash,
            config_hash
        );
    }
    true
}

/// Delays between fetch attempts of one task
fn retry_backoff() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(RETRY_INITIAL_INTERVAL)
        .with_max_interval(RETRY_MAX_INTERVAL)
        .with_max_elapsed_time(None)
        .build()
}

fn log_worker_exit(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            tracing::error!("Worker panicked: {}", e);
        } else {
            tracing::warn!("Worker cancelled: {}", e);
        }
    }
}
