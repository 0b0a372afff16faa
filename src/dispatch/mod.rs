//! One-turn orchestration.
//!
//! The dispatcher owns the shape of a handled turn: session bookkeeping,
//! typing indicator, generation (with the degraded fallback path),
//! evaluation turns, delivery, and lazy session eviction. No error leaves
//! `handle` — every failure path resolves to a best-effort user-visible
//! message.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::generation::{FallbackPipeline, Generator};
use crate::identity::IdGenerator;
use crate::persistence::{EvaluationRecord, EvaluationSink};
use crate::scoring::{self, PersuasionScore};
use crate::sessions::{Clock, Role, SessionStore};
use crate::telegram::types::{ChatAction, IncomingMessage};
use crate::telegram::TelegramClient;

/// Delivered when both the primary and the fallback generation paths fail.
pub const APOLOGY: &str = "Sorry, something went wrong. Please try again.";

pub struct Dispatcher {
    sessions: Arc<dyn SessionStore>,
    transport: Arc<TelegramClient>,
    generator: Arc<dyn Generator>,
    fallback: FallbackPipeline,
    evaluations: Arc<dyn EvaluationSink>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    session_ttl: Duration,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        transport: Arc<TelegramClient>,
        generator: Arc<dyn Generator>,
        fallback: FallbackPipeline,
        evaluations: Arc<dyn EvaluationSink>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            sessions,
            transport,
            generator,
            fallback,
            evaluations,
            ids,
            clock,
            session_ttl,
        }
    }

    /// Handle one inbound message. Infallible by contract: failures are
    /// logged and absorbed.
    pub async fn handle(&self, message: IncomingMessage) {
        let text = match message.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => {
                debug!(chat_id = message.chat.id, "ignoring message without text");
                return;
            }
        };

        if let Err(error) = self.handle_text(&message, &text).await {
            warn!(chat_id = message.chat.id, %error, "turn handling failed");
        }
    }

    async fn handle_text(&self, message: &IncomingMessage, text: &str) -> Result<()> {
        let chat_id = message.chat.id;
        let chat_key = chat_id.to_string();
        info!(chat_id, "received message");

        self.sessions.get_or_create(&chat_key).await?;
        self.sessions.append(&chat_key, Role::User, text).await?;

        // Non-critical; a missed indicator never blocks the turn.
        self.transport.send_status(chat_id, ChatAction::Typing).await;

        let reply = match parse_score_command(text) {
            Some(inline) => self.evaluation_reply(message, &chat_key, inline).await?,
            None => self.conversational_reply(&chat_key, text).await,
        };

        self.sessions
            .append(&chat_key, Role::Assistant, &reply)
            .await?;

        let outcome = self.transport.send_message(chat_id, &reply).await;
        if outcome.delivered {
            info!(chat_id, message_id = outcome.message_id, "reply delivered");
        } else {
            warn!(chat_id, "reply delivery could not be confirmed");
        }

        let evicted = self.sessions.evict_idle(self.session_ttl).await?;
        if evicted > 0 {
            debug!(evicted, "evicted idle sessions");
        }
        Ok(())
    }

    /// Primary generation with the degraded fallback chain.
    async fn conversational_reply(&self, chat_key: &str, text: &str) -> String {
        let history = match self.sessions.history(chat_key).await {
            Ok(history) => history,
            Err(error) => {
                warn!(chat = chat_key, %error, "session history unavailable");
                return APOLOGY.to_string();
            }
        };

        match self.generator.generate(&history).await {
            Ok(reply) => reply,
            Err(error) => {
                warn!(chat = chat_key, %error, "generation failed, trying fallback");
                match self.fallback.respond(chat_key, text).await {
                    Ok(reply) => reply,
                    Err(fallback_error) => {
                        warn!(chat = chat_key, %fallback_error, "fallback generation failed");
                        APOLOGY.to_string()
                    }
                }
            }
        }
    }

    /// Score the pitch, persist the record (best-effort), format feedback.
    async fn evaluation_reply(
        &self,
        message: &IncomingMessage,
        chat_key: &str,
        inline_argument: &str,
    ) -> Result<String> {
        let argument = if inline_argument.is_empty() {
            self.accumulated_pitch(chat_key).await?
        } else {
            inline_argument.to_string()
        };

        let score = scoring::score(&argument);
        info!(
            chat = chat_key,
            total = score.total,
            convinced = score.convinced,
            "evaluated pitch"
        );

        let record = EvaluationRecord::from_score(
            self.ids.evaluation_id(),
            self.clock.now().to_rfc3339(),
            chat_key.to_string(),
            message.from.as_ref().map(|user| {
                user.username
                    .clone()
                    .unwrap_or_else(|| user.first_name.clone())
            }),
            argument,
            &score,
        );
        match self.evaluations.save(&record).await {
            Ok(true) => info!(id = %record.id, sink = self.evaluations.name(), "evaluation saved"),
            Ok(false) => warn!(id = %record.id, "evaluation sink declined the record"),
            Err(error) => warn!(id = %record.id, %error, "evaluation persistence failed"),
        }

        Ok(format_evaluation(&score))
    }

    /// The user's prior turns joined into one argument, excluding the
    /// `/score` command turn itself.
    async fn accumulated_pitch(&self, chat_key: &str) -> Result<String> {
        let history = self.sessions.history(chat_key).await?;
        let mut user_texts: Vec<String> = history
            .iter()
            .filter(|turn| turn.role == Role::User)
            .map(|turn| turn.text.clone())
            .collect();
        user_texts.pop();
        Ok(user_texts.join(" "))
    }
}

/// Recognize an evaluation request. Returns the inline argument (possibly
/// empty) when the message is one.
fn parse_score_command(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("/score") {
        // Reject lookalikes such as "/scores".
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return Some(rest.trim());
        }
        return None;
    }
    if trimmed.eq_ignore_ascii_case("evaluate") {
        return Some("");
    }
    None
}

fn format_evaluation(score: &PersuasionScore) -> String {
    let mut reply = format!(
        "Evaluation complete! Your score: {}/100\n\n{}\n\n",
        score.total, score.impression
    );
    reply.push_str(&format!("Clarity & structure: {}/20\n", score.clarity));
    reply.push_str(&format!("Evidence & facts: {}/20\n", score.evidence));
    reply.push_str(&format!("Emotional connection: {}/20\n", score.emotional));
    reply.push_str(&format!("Handling objections: {}/20\n", score.objections));
    reply.push_str(&format!("Overall impact: {}/20\n\n", score.overall));

    reply.push_str("Strengths:\n");
    for strength in &score.strengths {
        reply.push_str(&format!("- {strength}\n"));
    }
    reply.push_str("\nAreas to improve:\n");
    for weakness in &score.weaknesses {
        reply.push_str(&format!("- {weakness}\n"));
    }

    reply.push('\n');
    if score.convinced {
        reply.push_str("You convinced me!");
    } else {
        reply.push_str("Not convinced yet. Refine your pitch and try again.");
    }
    reply
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TelegramConfig;
    use crate::generation::testing::{FailingGenerator, ScriptedGenerator};
    use crate::identity::testing::FixedIdGenerator;
    use crate::persistence::testing::MemorySink;
    use crate::sessions::{InMemorySessionStore, SystemClock};
    use crate::telegram::types::{Chat, User};
    use httpmock::prelude::*;

    struct Harness {
        dispatcher: Dispatcher,
        sessions: Arc<InMemorySessionStore>,
        sink: Arc<MemorySink>,
    }

    fn transport_for(base_url: &str) -> Arc<TelegramClient> {
        let config = TelegramConfig {
            bot_token: "test-token".to_string(),
            api_base: base_url.to_string(),
            api_ip: None,
            send_retry_attempts: 1,
            send_retry_base_ms: 1,
            action_retry_attempts: 1,
            action_retry_base_ms: 1,
            fetch_retry_attempts: 1,
            fetch_retry_base_ms: 1,
            ..TelegramConfig::default()
        };
        Arc::new(TelegramClient::from_config(
            &config,
            Arc::new(FixedIdGenerator::default()),
        ))
    }

    fn harness(
        base_url: &str,
        generator: Arc<dyn Generator>,
        fallback_generator: Arc<dyn Generator>,
        sink: MemorySink,
    ) -> Harness {
        let ttl = Duration::from_secs(1800);
        let sessions = Arc::new(InMemorySessionStore::new());
        let sink = Arc::new(sink);
        let dispatcher = Dispatcher::new(
            sessions.clone(),
            transport_for(base_url),
            generator,
            FallbackPipeline::new(fallback_generator, ttl),
            sink.clone(),
            Arc::new(FixedIdGenerator::default()),
            Arc::new(SystemClock),
            ttl,
        );
        Harness {
            dispatcher,
            sessions,
            sink,
        }
    }

    fn message(chat_id: i64, text: Option<&str>) -> IncomingMessage {
        IncomingMessage {
            chat: Chat { id: chat_id },
            text: text.map(str::to_string),
            from: Some(User {
                id: 1,
                first_name: "Ada".to_string(),
                username: Some("ada".to_string()),
            }),
        }
    }

    fn mock_send(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(POST).path("/bottest-token/sendMessage");
            then.status(200)
                .body(r#"{"ok":true,"result":{"message_id":1}}"#);
        })
    }

    fn mock_action(server: &MockServer) {
        server.mock(|when, then| {
            when.method(POST).path("/bottest-token/sendChatAction");
            then.status(200).body(r#"{"ok":true,"result":true}"#);
        });
    }

    #[tokio::test]
    async fn message_without_text_is_silently_ignored() {
        let server = MockServer::start();
        let send = mock_send(&server);
        let h = harness(
            &server.base_url(),
            Arc::new(ScriptedGenerator::new("hi")),
            Arc::new(FailingGenerator),
            MemorySink::default(),
        );

        h.dispatcher.handle(message(9, None)).await;
        h.dispatcher.handle(message(9, Some("   "))).await;

        send.assert_calls(0);
        assert_eq!(h.sessions.len().await, 0);
    }

    #[tokio::test]
    async fn conversational_turn_appends_both_roles_and_delivers() {
        let server = MockServer::start();
        let send = mock_send(&server);
        mock_action(&server);
        let h = harness(
            &server.base_url(),
            Arc::new(ScriptedGenerator::new("keep going!")),
            Arc::new(FailingGenerator),
            MemorySink::default(),
        );

        h.dispatcher.handle(message(42, Some("my pitch"))).await;

        let turns = h.sessions.history("42").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].text, "my pitch");
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].text, "keep going!");
        send.assert_calls(1);
    }

    #[tokio::test]
    async fn generation_failure_falls_back_then_apologizes() {
        let server = MockServer::start();
        mock_action(&server);
        let send = server.mock(|when, then| {
            when.method(POST)
                .path("/bottest-token/sendMessage")
                .body_includes("fallback says hi");
            then.status(200)
                .body(r#"{"ok":true,"result":{"message_id":1}}"#);
        });

        let h = harness(
            &server.base_url(),
            Arc::new(FailingGenerator),
            Arc::new(ScriptedGenerator::new("fallback says hi")),
            MemorySink::default(),
        );
        h.dispatcher.handle(message(42, Some("pitch"))).await;
        send.assert_calls(1);

        let turns = h.sessions.history("42").await.unwrap();
        assert_eq!(turns[1].text, "fallback says hi");
    }

    #[tokio::test]
    async fn double_generation_failure_delivers_the_apology() {
        let server = MockServer::start();
        mock_action(&server);
        let send = server.mock(|when, then| {
            when.method(POST)
                .path("/bottest-token/sendMessage")
                .body_includes(APOLOGY);
            then.status(200)
                .body(r#"{"ok":true,"result":{"message_id":1}}"#);
        });

        let h = harness(
            &server.base_url(),
            Arc::new(FailingGenerator),
            Arc::new(FailingGenerator),
            MemorySink::default(),
        );
        // Must not panic and must not error out to the caller.
        h.dispatcher.handle(message(42, Some("pitch"))).await;

        send.assert_calls(1);
        let turns = h.sessions.history("42").await.unwrap();
        assert_eq!(turns[1].text, APOLOGY);
    }

    #[tokio::test]
    async fn total_transport_failure_never_escapes_handle() {
        let h = harness(
            "http://127.0.0.1:1",
            Arc::new(ScriptedGenerator::new("hi")),
            Arc::new(FailingGenerator),
            MemorySink::default(),
        );
        // Typing indicator and delivery both fail; the turn still completes.
        h.dispatcher.handle(message(42, Some("pitch"))).await;
        assert_eq!(h.sessions.history("42").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn score_command_persists_a_record_and_replies_with_the_total() {
        let server = MockServer::start();
        mock_action(&server);
        let send = server.mock(|when, then| {
            when.method(POST)
                .path("/bottest-token/sendMessage")
                .body_includes("Evaluation complete!");
            then.status(200)
                .body(r#"{"ok":true,"result":{"message_id":1}}"#);
        });

        let h = harness(
            &server.base_url(),
            Arc::new(ScriptedGenerator::new("unused")),
            Arc::new(FailingGenerator),
            MemorySink::default(),
        );
        h.dispatcher
            .handle(message(42, Some("/score I believe we can save 42 percent")))
            .await;

        send.assert_calls(1);
        let records = h.sink.records.lock();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "eval-0001");
        assert_eq!(records[0].user_id, "42");
        assert_eq!(records[0].user_name.as_deref(), Some("ada"));
        assert_eq!(records[0].argument, "I believe we can save 42 percent");
        assert!(!records[0].strengths.is_empty());
        assert!(!records[0].weaknesses.is_empty());
    }

    #[tokio::test]
    async fn bare_score_command_evaluates_the_accumulated_pitch() {
        let server = MockServer::start();
        mock_action(&server);
        mock_send(&server);

        let h = harness(
            &server.base_url(),
            Arc::new(ScriptedGenerator::new("noted")),
            Arc::new(FailingGenerator),
            MemorySink::default(),
        );
        h.dispatcher.handle(message(42, Some("first part"))).await;
        h.dispatcher.handle(message(42, Some("second part"))).await;
        h.dispatcher.handle(message(42, Some("/score"))).await;

        let records = h.sink.records.lock();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].argument, "first part second part");
    }

    #[tokio::test]
    async fn sink_failure_is_swallowed_and_the_reply_still_goes_out() {
        let server = MockServer::start();
        mock_action(&server);
        let send = mock_send(&server);

        let h = harness(
            &server.base_url(),
            Arc::new(ScriptedGenerator::new("unused")),
            Arc::new(FailingGenerator),
            MemorySink::failing(),
        );
        h.dispatcher.handle(message(42, Some("/score a pitch"))).await;

        send.assert_calls(1);
        assert!(h.sink.records.lock().is_empty());
    }

    #[test]
    fn score_command_parsing() {
        assert_eq!(parse_score_command("/score my pitch"), Some("my pitch"));
        assert_eq!(parse_score_command("  /score  "), Some(""));
        assert_eq!(parse_score_command("Evaluate"), Some(""));
        assert_eq!(parse_score_command("tell me more"), None);
        assert_eq!(parse_score_command("scores are fun"), None);
        assert_eq!(parse_score_command("/scores"), None);
    }

    #[test]
    fn evaluation_reply_lists_every_section() {
        let score = scoring::score("I believe we can save 42 percent, however \"costs matter\"?");
        let reply = format_evaluation(&score);
        assert!(reply.contains(&format!("Your score: {}/100", score.total)));
        assert!(reply.contains("Clarity & structure:"));
        assert!(reply.contains("Strengths:\n- "));
        assert!(reply.contains("Areas to improve:\n- "));
    }
}
