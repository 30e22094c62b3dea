//! Session pool
//!
//! A session is one network identity: its own cookie jar and egress proxy,
//! wrapped in a dedicated HTTP client. Workers lease a session per request.
//! A leased session is taken out of the pool, so no two workers can use it
//! at the same time; it returns to the pool when the lease is dropped,
//! unless it was retired (blocked, worn out, or too many errors).

use crate::config::SessionConfig;
use crate::crawler::fetcher::build_http_client;
use crate::crawler::proxy::{redact_proxy_url, ProxyConfiguration};
use crate::DirectoryError;
use rand::Rng;
use reqwest::cookie::Jar;
use reqwest::Client;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// One network identity
///
/// Clones share the underlying client and connection pool.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    client: Client,
    proxy_url: Option<String>,
    usage_count: u32,
    error_score: u32,
    retired: bool,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Proxy identity for logs, credentials redacted
    pub fn proxy_label(&self) -> String {
        self.proxy_url
            .as_deref()
            .map(redact_proxy_url)
            .unwrap_or_else(|| "direct".to_string())
    }

    pub fn usage_count(&self) -> u32 {
        self.usage_count
    }

    pub fn error_score(&self) -> u32 {
        self.error_score
    }

    fn is_usable(&self, settings: &SessionConfig) -> bool {
        !self.retired
            && self.usage_count < settings.max_usage_count
            && self.error_score < settings.max_error_score
    }
}

/// Snapshot of the pool's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub idle: usize,
    pub leased: usize,
    pub created: u64,
    pub retired: u64,
}

struct PoolState {
    idle: Vec<Session>,
    leased: usize,
    created: u64,
    retired: u64,
}

/// Rotating pool of sessions shared by all workers
pub struct SessionPool {
    settings: SessionConfig,
    timeout: Duration,
    proxy: ProxyConfiguration,
    state: Mutex<PoolState>,
    released: Notify,
}

impl SessionPool {
    /// Creates an empty pool; sessions are created lazily on acquisition
    ///
    /// # Arguments
    ///
    /// * `settings` - Pool size and retirement limits
    /// * `timeout` - Per-request timeout of each session's client
    /// * `proxy` - Source of egress proxies for new sessions
    pub fn new(settings: SessionConfig, timeout: Duration, proxy: ProxyConfiguration) -> Self {
        Self {
            settings,
            timeout,
            proxy,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                leased: 0,
                created: 0,
                retired: 0,
            }),
            released: Notify::new(),
        }
    }

    /// Leases a session
    ///
    /// While the pool is below its maximum size every acquisition creates a
    /// fresh session, so consecutive requests rotate identities. Once full,
    /// a random idle session is picked. When every session is leased, waits
    /// for one to be released.
    pub async fn acquire(self: &Arc<Self>) -> Result<SessionLease, DirectoryError> {
        loop {
            let released = {
                let mut state = self.lock_state();
                let live = state.idle.len() + state.leased;

                if live < self.settings.max_pool_size as usize {
                    let session = self.create_session(&mut state)?;
                    state.leased += 1;
                    return Ok(SessionLease::new(Arc::clone(self), session));
                }

                if !state.idle.is_empty() {
                    let index = rand::rng().random_range(0..state.idle.len());
                    let session = state.idle.swap_remove(index);
                    state.leased += 1;
                    return Ok(SessionLease::new(Arc::clone(self), session));
                }

                self.released.notified()
            };

            tracing::trace!("All sessions leased, waiting for a release");
            released.await;
        }
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.lock_state();
        PoolStats {
            idle: state.idle.len(),
            leased: state.leased,
            created: state.created,
            retired: state.retired,
        }
    }

    /// Describes the proxy configuration, for startup logs
    pub fn proxy_description(&self) -> String {
        self.proxy.describe()
    }

    fn create_session(&self, state: &mut PoolState) -> Result<Session, DirectoryError> {
        state.created += 1;
        let id = format!("session_{}", state.created);
        let proxy_url = self.proxy.new_proxy_url(&id);

        let client =
            build_http_client(self.timeout, proxy_url.as_deref(), Arc::new(Jar::default()))
                .map_err(|e| {
                    DirectoryError::Session(format!("failed to build client for {}: {}", id, e))
                })?;

        let session = Session {
            id,
            client,
            proxy_url,
            usage_count: 0,
            error_score: 0,
            retired: false,
        };
        tracing::debug!("Created {} ({})", session.id, session.proxy_label());

        Ok(session)
    }

    fn release(&self, session: Session) {
        {
            let mut state = self.lock_state();
            state.leased -= 1;

            if session.is_usable(&self.settings) {
                state.idle.push(session);
            } else {
                state.retired += 1;
                tracing::debug!(
                    "Retired {} (usage {}, errors {})",
                    session.id,
                    session.usage_count,
                    session.error_score
                );
            }
        }
        self.released.notify_one();
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive use of one session; returns it to the pool on drop
pub struct SessionLease {
    pool: Arc<SessionPool>,
    session: Session,
}

impl SessionLease {
    fn new(pool: Arc<SessionPool>, session: Session) -> Self {
        Self { pool, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Records a request the site answered normally
    pub fn mark_good(&mut self) {
        self.session.usage_count += 1;
        self.session.error_score = self.session.error_score.saturating_sub(1);
    }

    /// Records a failed request
    pub fn mark_bad(&mut self) {
        self.session.usage_count += 1;
        self.session.error_score += 1;
    }

    /// Takes the session out of rotation (e.g. the site blocked it)
    pub fn retire(&mut self) {
        self.session.usage_count += 1;
        self.session.retired = true;
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.pool.release(self.session.clone());
    }
}
