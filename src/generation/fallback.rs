//! Degraded generation path.
//!
//! Runs the same generator contract against its own isolated session store,
//! so fallback turns never leak into the primary store when the main path
//! recovers.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::sessions::{InMemorySessionStore, Role, SessionStore};

use super::traits::Generator;

pub struct FallbackPipeline {
    sessions: Arc<dyn SessionStore>,
    generator: Arc<dyn Generator>,
    session_ttl: Duration,
}

impl FallbackPipeline {
    pub fn new(generator: Arc<dyn Generator>, session_ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(InMemorySessionStore::new()),
            generator,
            session_ttl,
        }
    }

    /// Produce a reply for `text` using only fallback-local state. Errors
    /// propagate so the caller can substitute the fixed apology.
    pub async fn respond(&self, chat_id: &str, text: &str) -> Result<String> {
        info!(chat_id, "handling turn through the fallback pipeline");
        self.sessions.append(chat_id, Role::User, text).await?;
        let history = self.sessions.history(chat_id).await?;

        let reply = self.generator.generate(&history).await?;
        self.sessions
            .append(chat_id, Role::Assistant, &reply)
            .await?;
        self.sessions.evict_idle(self.session_ttl).await?;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::testing::{FailingGenerator, ScriptedGenerator};
    use crate::sessions::Turn;

    #[tokio::test]
    async fn respond_tracks_its_own_history() {
        let generator = Arc::new(ScriptedGenerator::new("coached reply"));
        let pipeline = FallbackPipeline::new(generator.clone(), Duration::from_secs(1800));

        let reply = pipeline.respond("chat-1", "my pitch").await.unwrap();
        assert_eq!(reply, "coached reply");

        pipeline.respond("chat-1", "more").await.unwrap();
        let seen: Vec<Turn> = generator.last_input();
        // Second call sees user, assistant, user from the fallback store.
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].text, "my pitch");
        assert_eq!(seen[1].text, "coached reply");
    }

    #[tokio::test]
    async fn fallback_state_never_leaks_into_the_primary_store() {
        let primary: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let pipeline = FallbackPipeline::new(
            Arc::new(ScriptedGenerator::new("ok")),
            Duration::from_secs(1800),
        );

        pipeline.respond("chat-1", "hello").await.unwrap();
        assert!(primary.history("chat-1").await.unwrap().is_empty());
        assert_eq!(pipeline.sessions.history("chat-1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn generator_failure_propagates_to_the_caller() {
        let pipeline =
            FallbackPipeline::new(Arc::new(FailingGenerator), Duration::from_secs(1800));
        assert!(pipeline.respond("chat-1", "hello").await.is_err());
    }
}
