use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{error::Result, state::ConversationState};

/// Handle to one session's state. Holding the lock serializes turns for that session.
pub type SharedState = Arc<Mutex<ConversationState>>;

/// Trait for storing and retrieving conversation state by session id
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Get the state for `id`, creating a fresh one on first use
    async fn acquire(&self, id: &str) -> Result<SharedState>;

    /// Get the state for `id` without creating it
    async fn get(&self, id: &str) -> Result<Option<SharedState>>;

    /// Copy of the current state, waiting for any in-flight turn to finish
    async fn snapshot(&self, id: &str) -> Result<Option<ConversationState>>;

    /// Drop a session once its in-flight turn has finished. Returns whether it existed.
    ///
    /// A session some other caller still holds a handle to is reset in place instead.
    async fn evict(&self, id: &str) -> Result<bool>;

    /// Drop sessions idle for longer than `max_idle`. Sessions mid-turn are kept.
    async fn sweep_idle(&self, max_idle: Duration) -> Result<usize>;

    async fn len(&self) -> Result<usize>;
}

/// In-memory implementation of SessionStore
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<DashMap<String, SharedState>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }
}

/// Only the map holds the handle and nobody is mid-turn
fn is_unused_and_idle(state: &SharedState, max_idle: Duration) -> bool {
    Arc::strong_count(state) == 1
        && state
            .try_lock()
            .map(|state| is_idle(&state, max_idle))
            .unwrap_or(false)
}

fn is_idle(state: &ConversationState, max_idle: Duration) -> bool {
    (Utc::now() - state.last_activity)
        .to_std()
        .map(|elapsed| elapsed > max_idle)
        .unwrap_or(false)
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn acquire(&self, id: &str) -> Result<SharedState> {
        let state = self
            .sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                debug!(session_id = %id, "Creating conversation state");
                Arc::new(Mutex::new(ConversationState::new()))
            })
            .value()
            .clone();
        Ok(state)
    }

    async fn get(&self, id: &str) -> Result<Option<SharedState>> {
        Ok(self.sessions.get(id).map(|entry| entry.value().clone()))
    }

    async fn snapshot(&self, id: &str) -> Result<Option<ConversationState>> {
        let Some(state) = self.get(id).await? else {
            return Ok(None);
        };
        let guard = state.lock().await;
        Ok(Some(guard.clone()))
    }

    async fn evict(&self, id: &str) -> Result<bool> {
        let Some(state) = self.get(id).await? else {
            return Ok(false);
        };
        let mut guard = state.lock().await;

        // The map and `state` are the only holders
        let removed = self
            .sessions
            .remove_if(id, |_, entry| {
                Arc::ptr_eq(entry, &state) && Arc::strong_count(entry) == 2
            })
            .is_some();

        if !removed {
            debug!(session_id = %id, "Session still in use, resetting instead of removing");
            guard.reset();
        }
        Ok(true)
    }

    async fn sweep_idle(&self, max_idle: Duration) -> Result<usize> {
        let candidates: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| is_unused_and_idle(entry.value(), max_idle))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for id in candidates {
            let evicted = self
                .sessions
                .remove_if(&id, |_, state| is_unused_and_idle(state, max_idle));
            if evicted.is_some() {
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(removed, "Swept idle sessions");
        }
        Ok(removed)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.sessions.len())
    }
}
