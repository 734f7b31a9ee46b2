//! # Session Store
//!
//! A concurrent map from subscriber number to in-flight [`Session`], with
//! idle eviction. This is the only place sessions live; nothing else holds
//! one across requests.
//!
//! ## Concurrency notes
//!
//! The USSD gateway serializes requests *per subscriber* — the same phone
//! cannot have two menu steps in flight — so we never need to linearize a
//! session against itself. Different subscribers arrive in parallel, so the
//! map itself is a `DashMap`.
//!
//! The idle sweep runs on a fixed interval. `DashMap::retain` takes the
//! shard write lock per entry, and a commit that lands after the sweep
//! removed the entry simply re-inserts it with a fresh timestamp — the
//! in-flight request always wins over an expiry decision that predates it.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::Session;
use crate::config::{SESSION_IDLE_TIMEOUT, SESSION_SWEEP_INTERVAL};

/// Concurrent subscriber → session map with idle expiry.
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    idle_timeout: Duration,
}

impl SessionStore {
    /// Creates a store with the configured idle timeout.
    pub fn new() -> Self {
        Self::with_idle_timeout(SESSION_IDLE_TIMEOUT)
    }

    /// Creates a store with a custom idle timeout (tests mostly).
    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout,
        }
    }

    /// Returns the subscriber's current session, creating a fresh one at
    /// the main menu if none exists.
    pub fn get_or_create(&self, msisdn: &str) -> Session {
        self.sessions
            .entry(msisdn.to_string())
            .or_insert_with(|| Session::new(msisdn))
            .clone()
    }

    /// Commits a session transition. Stamps the activity time so the sweep
    /// sees this request.
    pub fn commit(&self, mut session: Session) {
        session.touch();
        self.sessions.insert(session.msisdn.clone(), session);
    }

    /// Destroys the subscriber's session. Called on every terminal reply
    /// and on internal faults — a dead flow must not be resumable.
    pub fn clear(&self, msisdn: &str) {
        self.sessions.remove(msisdn);
    }

    /// Number of live sessions (for metrics).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// `true` if no sessions are live.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Evicts every session idle past the timeout. Returns how many were
    /// removed.
    pub fn sweep_idle(&self) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.idle_timeout)
                .unwrap_or_else(|_| chrono::Duration::minutes(10));
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_idle_since(cutoff));
        before - self.sessions.len()
    }

    /// Spawns the background sweep loop. The task runs until aborted;
    /// dropping the handle detaches it, which is fine for a process-lifetime
    /// store.
    pub fn spawn_sweeper(store: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                let evicted = store.sweep_idle();
                if evicted > 0 {
                    tracing::debug!(evicted, live = store.len(), "idle sessions swept");
                }
            }
        })
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
