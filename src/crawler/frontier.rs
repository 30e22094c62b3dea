//! Request frontier
//!
//! This module handles:
//! - The FIFO queue of pending crawl tasks
//! - URL deduplication (first-seen label wins)
//! - In-flight accounting, so the crawl knows when it has drained
//!
//! The frontier is shared by the dispatcher and every worker. Its state sits
//! behind a mutex that is never held across an `.await`; waiters are woken
//! through a `Notify` whenever work is added or finished.

use crate::crawler::task::Task;
use crate::url::normalize_url;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

struct FrontierState {
    /// Tasks waiting to be dispatched
    queue: VecDeque<Task>,

    /// Normalized URLs ever enqueued (or restored as already handled)
    seen: HashSet<String>,

    /// Tasks dispatched and not yet finished
    in_flight: usize,

    /// Total number of tasks dispatched
    dispatched: u64,
}

/// Shared queue of pending tasks with URL deduplication
pub struct Frontier {
    state: Mutex<FrontierState>,
    changed: Notify,
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}

impl Frontier {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FrontierState {
                queue: VecDeque::new(),
                seen: HashSet::new(),
                in_flight: 0,
                dispatched: 0,
            }),
            changed: Notify::new(),
        }
    }

    /// Adds a task unless its URL was seen before
    ///
    /// The task's URL is replaced by its normalized form, which is also its
    /// identity. Returns true if the task was queued.
    pub fn enqueue(&self, mut task: Task) -> bool {
        let normalized = match normalize_url(task.url.as_str()) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Not enqueuing {}: {}", task.url, e);
                return false;
            }
        };
        task.url = normalized;

        {
            let mut state = self.lock_state();
            if !state.seen.insert(task.key().to_string()) {
                return false;
            }
            state.queue.push_back(task);
        }

        self.changed.notify_waiters();
        true
    }

    /// Records a URL as already handled, so it is never queued again
    pub fn mark_seen(&self, url: &str) {
        if let Ok(normalized) = normalize_url(url) {
            self.lock_state().seen.insert(normalized.to_string());
        }
    }

    /// Returns true if `key`, a normalized URL, was queued or marked seen
    pub fn is_seen(&self, key: &str) -> bool {
        self.lock_state().seen.contains(key)
    }

    /// Waits for the next task
    ///
    /// Returns `None` once the queue is empty and no task is in flight,
    /// i.e. when no more work can appear. The returned guard keeps the task
    /// counted as in flight until it is dropped.
    pub async fn next(self: &Arc<Self>) -> Option<InFlight> {
        loop {
            let changed = {
                let mut state = self.lock_state();

                if let Some(task) = state.queue.pop_front() {
                    state.in_flight += 1;
                    state.dispatched += 1;
                    return Some(InFlight {
                        frontier: Arc::clone(self),
                        task,
                    });
                }

                if state.in_flight == 0 {
                    return None;
                }

                // Registered before the lock is released, so a completion
                // between here and the await is not missed
                self.changed.notified()
            };

            changed.await;
        }
    }

    /// Number of tasks waiting to be dispatched
    pub fn len(&self) -> usize {
        self.lock_state().queue.len()
    }

    /// Returns whether no task is waiting
    pub fn is_empty(&self) -> bool {
        self.lock_state().queue.is_empty()
    }

    /// Number of tasks currently being processed
    pub fn in_flight(&self) -> usize {
        self.lock_state().in_flight
    }

    /// Total number of tasks dispatched so far
    pub fn dispatched(&self) -> u64 {
        self.lock_state().dispatched
    }

    fn finish(&self) {
        {
            let mut state = self.lock_state();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.changed.notify_waiters();
    }

    fn lock_state(&self) -> MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A dispatched task; marks it finished when dropped, even on panic
pub struct InFlight {
    frontier: Arc<Frontier>,
    task: Task,
}

impl InFlight {
    pub fn task(&self) -> &Task {
        &self.task
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.frontier.finish();
    }
}
