//! Session management: per-chat turn history with idle eviction.

pub mod in_memory;
pub mod traits;

pub use in_memory::InMemorySessionStore;
pub use traits::{Clock, Role, Session, SessionStore, SystemClock, Turn};

use std::sync::Arc;

/// Create the default in-memory session store.
pub fn create_session_store() -> Arc<dyn SessionStore> {
    Arc::new(InMemorySessionStore::new())
}
