//! Session storage traits and types for conversation state.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message exchanged in a conversation. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot of a tracked conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Platform-assigned chat identifier. Unique per session.
    pub chat_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub turns: Vec<Turn>,
}

/// Clock abstraction so eviction can be tested deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used outside tests.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Storage for per-chat turn history.
///
/// Callers never retain a `Session` across turns; they re-acquire it from
/// the store so the store remains the single owner of conversation state.
/// Per-chat serialization is guaranteed by the poller's sequential dispatch,
/// not by this trait.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Return the session for `chat_id`, creating an empty one on first
    /// contact.
    async fn get_or_create(&self, chat_id: &str) -> Result<Session>;

    /// Append a turn and refresh the session's activity timestamp.
    async fn append(&self, chat_id: &str, role: Role, text: &str) -> Result<()>;

    /// The ordered turn history for `chat_id` (empty if unknown).
    async fn history(&self, chat_id: &str) -> Result<Vec<Turn>>;

    /// Remove every session idle for longer than `ttl`. Returns the number
    /// of sessions removed. Invoked lazily after handled turns, never by a
    /// background timer.
    async fn evict_idle(&self, ttl: Duration) -> Result<usize>;

    /// Number of live sessions.
    async fn len(&self) -> usize;

    /// The name of this session store implementation.
    fn name(&self) -> &str;
}
