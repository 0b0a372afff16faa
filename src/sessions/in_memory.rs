//! In-memory session store implementation.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::traits::{Clock, Role, Session, SessionStore, SystemClock, Turn};

/// A session store backed by a mutex-protected hash map.
///
/// Sessions are only reclaimed through [`SessionStore::evict_idle`], which
/// runs after handled turns. A chat that goes permanently silent therefore
/// stays resident until activity on any other chat triggers a sweep.
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    clock: Arc<dyn Clock>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, chat_id: &str) -> Result<Session> {
        let mut sessions = self.sessions.lock();
        let session = sessions.entry(chat_id.to_string()).or_insert_with(|| {
            debug!("creating new session for chat {chat_id}");
            let now = self.clock.now();
            Session {
                chat_id: chat_id.to_string(),
                created_at: now,
                last_activity: now,
                turns: Vec::new(),
            }
        });
        Ok(session.clone())
    }

    async fn append(&self, chat_id: &str, role: Role, text: &str) -> Result<()> {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock();
        let session = sessions
            .entry(chat_id.to_string())
            .or_insert_with(|| Session {
                chat_id: chat_id.to_string(),
                created_at: now,
                last_activity: now,
                turns: Vec::new(),
            });
        session.turns.push(Turn {
            role,
            text: text.to_string(),
            timestamp: now,
        });
        session.last_activity = now;
        Ok(())
    }

    async fn history(&self, chat_id: &str) -> Result<Vec<Turn>> {
        let sessions = self.sessions.lock();
        Ok(sessions
            .get(chat_id)
            .map(|s| s.turns.clone())
            .unwrap_or_default())
    }

    async fn evict_idle(&self, ttl: Duration) -> Result<usize> {
        let now = self.clock.now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|chat_id, session| {
            let keep = now - session.last_activity <= ttl;
            if !keep {
                debug!("evicting idle session for chat {chat_id}");
            }
            keep
        });
        Ok(before - sessions.len())
    }

    async fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}
