//! Bookkeeping identifier generation.
//!
//! Synthesized message ids and evaluation record ids go through this
//! abstraction so tests can supply deterministic generators.

use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

pub trait IdGenerator: Send + Sync {
    /// Identifier for a synthesized (undelivered) outbound message.
    fn message_id(&self) -> i64;

    /// Identifier for a persisted evaluation record.
    fn evaluation_id(&self) -> String;
}

/// Production generator: sequential message ids, UUIDv4 record ids.
pub struct DefaultIdGenerator {
    next_message_id: AtomicI64,
}

impl DefaultIdGenerator {
    pub fn new() -> Self {
        Self {
            next_message_id: AtomicI64::new(1),
        }
    }
}

impl Default for DefaultIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for DefaultIdGenerator {
    fn message_id(&self) -> i64 {
        self.next_message_id.fetch_add(1, Ordering::Relaxed)
    }

    fn evaluation_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
