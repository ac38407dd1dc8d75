//! Session registry: session id → conversation state.
//!
//! Insert-if-absent is atomic (`DashMap::entry`). Each session's state sits behind
//! its own mutex so the reply path and the background worker serialize per session
//! while different sessions never contend.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::info;

use crate::interview::session::ConversationState;

pub type SessionHandle = Arc<Mutex<ConversationState>>;

pub struct SessionRegistry {
    sessions: DashMap<String, SessionHandle>,
    max_root_resets: u32,
}

impl SessionRegistry {
    pub fn new(max_root_resets: u32) -> Self {
        Self {
            sessions: DashMap::new(),
            max_root_resets,
        }
    }

    /// Returns the session's state, creating it on first use.
    pub fn get_or_create(&self, session_id: &str, user_id: &str) -> SessionHandle {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                info!("Starting interview session {session_id} for user {user_id}");
                Arc::new(Mutex::new(ConversationState::new(
                    session_id,
                    user_id,
                    self.max_root_resets,
                )))
            })
            .value()
            .clone()
    }

    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.get(session_id).map(|s| s.value().clone())
    }

    /// Explicit close. Returns whether the session existed.
    pub fn close(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            info!("Closed interview session {session_id}");
        }
        removed
    }

    /// Drops sessions idle for longer than `ttl`. Sessions busy with a turn are kept.
    /// Returns how many were evicted.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, handle| match handle.try_lock() {
            Ok(state) => state.idle_for() < ttl,
            Err(_) => true,
        });
        let evicted = before.saturating_sub(self.len());
        if evicted > 0 {
            info!(
                "Evicted {evicted} idle interview sessions, {} still active",
                self.len()
            );
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Periodically evicts idle sessions until the runtime shuts down.
pub fn spawn_sweeper(
    registry: Arc<SessionRegistry>,
    ttl: Duration,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if !registry.is_empty() {
                registry.evict_idle(ttl);
            }
        }
    })
}
