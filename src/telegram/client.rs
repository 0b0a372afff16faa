//! Resilient Telegram Bot API client.
//!
//! Every operation runs through one generic dual-endpoint executor: each
//! retry attempt first hits the primary (domain-addressed) endpoint and, on
//! any network or TLS failure, the secondary client whose DNS is pinned to a
//! literal API address. Certificate validation keeps working on the
//! secondary path because the request URL still names the real virtual host.
//!
//! None of the four operations ever returns an error to the caller. When
//! every attempt on both endpoints fails, the operation resolves to a
//! synthesized result so the rest of the pipeline keeps moving.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::TelegramConfig;
use crate::identity::IdGenerator;

use super::types::{
    ApiEnvelope, BotIdentity, ChatAction, FetchOutcome, IdentityOutcome, SendOutcome, Update,
};

/// Extra request-timeout headroom on top of the long-poll window.
const LONG_POLL_SLACK: Duration = Duration::from_secs(10);

/// A failure inside one attempt against one endpoint. Never leaves this
/// module: the executor absorbs it into a synthesized outcome.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api rejected the call (ok=false)")]
    Rejected,
    #[error("api response missing result payload")]
    MissingResult,
}

/// Iterative retry schedule: `initial_delay * 2^(attempt-1)`, multiplier
/// fixed at 2.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

pub struct TelegramClient {
    primary: Client,
    secondary: Client,
    base_url: String,
    send_policy: RetryPolicy,
    action_policy: RetryPolicy,
    fetch_policy: RetryPolicy,
    ids: Arc<dyn IdGenerator>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

impl TelegramClient {
    pub fn from_config(config: &TelegramConfig, ids: Arc<dyn IdGenerator>) -> Self {
        let base = config.api_base.trim_end_matches('/');
        let primary = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        let secondary = build_secondary_client(&config.api_base, config.api_ip.as_deref())
            .unwrap_or_else(|| primary.clone());

        Self {
            primary,
            secondary,
            base_url: format!("{base}/bot{}", config.bot_token),
            send_policy: RetryPolicy {
                max_attempts: config.send_retry_attempts,
                initial_delay: Duration::from_millis(config.send_retry_base_ms),
            },
            action_policy: RetryPolicy {
                max_attempts: config.action_retry_attempts,
                initial_delay: Duration::from_millis(config.action_retry_base_ms),
            },
            fetch_policy: RetryPolicy {
                max_attempts: config.fetch_retry_attempts,
                initial_delay: Duration::from_millis(config.fetch_retry_base_ms),
            },
            ids,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    /// Probe the bot identity (`getMe`). Resolves to a synthesized identity
    /// when both endpoints are unreachable.
    pub async fn probe_identity(&self) -> IdentityOutcome {
        let url = self.method_url("getMe");
        let result = self
            .execute("getMe", self.send_policy, move |client| {
                let url = url.clone();
                async move { read_envelope::<BotIdentity>(client.get(&url).send().await?).await }
            })
            .await;

        match result {
            Some(identity) => IdentityOutcome {
                identity,
                live: true,
            },
            None => {
                warn!("getMe failed on both endpoints, continuing with synthesized identity");
                IdentityOutcome {
                    identity: BotIdentity {
                        id: 0,
                        first_name: "PitchSmith".to_string(),
                        username: Some("PitchSmithBot".to_string()),
                    },
                    live: false,
                }
            }
        }
    }

    /// Long-poll for updates at or after `offset`. Resolves to an empty
    /// batch (with `live = false`) when both endpoints are unreachable.
    pub async fn fetch_updates(&self, offset: i64, timeout: Duration) -> FetchOutcome {
        let url = self.method_url("getUpdates");
        let timeout_secs = timeout.as_secs();
        let result = self
            .execute("getUpdates", self.fetch_policy, move |client| {
                let url = url.clone();
                async move {
                    let response = client
                        .get(&url)
                        .query(&[("offset", offset.to_string()), ("timeout", timeout_secs.to_string())])
                        .timeout(timeout + LONG_POLL_SLACK)
                        .send()
                        .await?;
                    read_envelope::<Vec<Update>>(response).await
                }
            })
            .await;

        match result {
            Some(updates) => FetchOutcome {
                updates,
                live: true,
            },
            None => {
                warn!("getUpdates failed on both endpoints, returning empty batch");
                FetchOutcome {
                    updates: Vec::new(),
                    live: false,
                }
            }
        }
    }

    /// Send a message. Never fails: when both endpoints are unreachable the
    /// outcome is a synthesized accepted result with `delivered = false` —
    /// delivery is best-effort at-most-once and cannot be confirmed on that
    /// path.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> SendOutcome {
        let url = self.method_url("sendMessage");
        let body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });
        let result = self
            .execute("sendMessage", self.send_policy, move |client| {
                let url = url.clone();
                let body = body.clone();
                async move {
                    read_envelope::<SentMessage>(client.post(&url).json(&body).send().await?).await
                }
            })
            .await;

        match result {
            Some(sent) => SendOutcome {
                message_id: sent.message_id,
                delivered: true,
            },
            None => {
                warn!(chat_id, "sendMessage failed on both endpoints, synthesizing acceptance");
                SendOutcome {
                    message_id: self.ids.message_id(),
                    delivered: false,
                }
            }
        }
    }

    /// Send a chat-action indicator. Non-critical: failures are absorbed
    /// and reported only through the returned flag.
    pub async fn send_status(&self, chat_id: i64, action: ChatAction) -> bool {
        let url = self.method_url("sendChatAction");
        let body = json!({
            "chat_id": chat_id,
            "action": action.as_str(),
        });
        let result = self
            .execute("sendChatAction", self.action_policy, move |client| {
                let url = url.clone();
                let body = body.clone();
                async move {
                    read_envelope::<bool>(client.post(&url).json(&body).send().await?).await
                }
            })
            .await;

        match result {
            Some(_) => true,
            None => {
                debug!(chat_id, "sendChatAction failed on both endpoints, ignoring");
                false
            }
        }
    }

    /// Run one logical operation: per attempt, primary endpoint first, then
    /// the secondary on any failure, with exponential backoff between
    /// attempts. Returns `None` when every attempt on both endpoints failed.
    async fn execute<T, F, Fut>(&self, op: &str, policy: RetryPolicy, request: F) -> Option<T>
    where
        F: Fn(Client) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let max_attempts = policy.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match request(self.primary.clone()).await {
                Ok(value) => return Some(value),
                Err(primary_err) => {
                    debug!(op, attempt, %primary_err, "primary endpoint failed, trying secondary");
                }
            }

            match request(self.secondary.clone()).await {
                Ok(value) => {
                    info!(op, attempt, "operation succeeded via secondary endpoint");
                    return Some(value);
                }
                Err(secondary_err) => {
                    warn!(op, attempt, max_attempts, %secondary_err, "both endpoints failed");
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(policy.delay_for(attempt)).await;
            }
        }
        None
    }
}

/// Build the secondary client with DNS for the API host pinned to the
/// configured literal address. Returns `None` when there is nothing to pin
/// (missing or unparsable address, or the base URL already names an IP).
fn build_secondary_client(api_base: &str, api_ip: Option<&str>) -> Option<Client> {
    let ip: IpAddr = api_ip?.trim().parse().ok()?;
    let url = reqwest::Url::parse(api_base).ok()?;
    let host = url.host_str()?;
    if host.parse::<IpAddr>().is_ok() {
        return None;
    }
    let port = url.port_or_known_default().unwrap_or(443);

    Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .resolve(host, SocketAddr::new(ip, port))
        .build()
        .ok()
}

async fn read_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, TransportError> {
    let envelope: ApiEnvelope<T> = response.error_for_status()?.json().await?;
    if !envelope.ok {
        return Err(TransportError::Rejected);
    }
    envelope.result.ok_or(TransportError::MissingResult)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::testing::FixedIdGenerator;
    use httpmock::prelude::*;

    fn test_config(base_url: &str) -> TelegramConfig {
        TelegramConfig {
            bot_token: "test-token".to_string(),
            api_base: base_url.to_string(),
            api_ip: None,
            send_retry_attempts: 2,
            send_retry_base_ms: 1,
            action_retry_attempts: 1,
            action_retry_base_ms: 1,
            fetch_retry_attempts: 2,
            fetch_retry_base_ms: 1,
            ..TelegramConfig::default()
        }
    }

    fn test_client(base_url: &str) -> TelegramClient {
        TelegramClient::from_config(
            &test_config(base_url),
            Arc::new(FixedIdGenerator::default()),
        )
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_attempts: 4,
            initial_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
    }

    #[test]
    fn secondary_client_requires_domain_host_and_address() {
        assert!(build_secondary_client("https://api.telegram.org", Some("149.154.167.220")).is_some());
        assert!(build_secondary_client("https://api.telegram.org", None).is_none());
        assert!(build_secondary_client("https://api.telegram.org", Some("not-an-ip")).is_none());
        // Base URL already literal: nothing to pin.
        assert!(build_secondary_client("https://149.154.167.220", Some("149.154.167.220")).is_none());
    }

    #[tokio::test]
    async fn probe_identity_parses_live_response() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/bottest-token/getMe");
            then.status(200).body(
                r#"{"ok":true,"result":{"id":7771432535,"is_bot":true,"first_name":"PitchSmith","username":"PitchSmithBot"}}"#,
            );
        });

        let outcome = test_client(&server.base_url()).probe_identity().await;
        assert!(outcome.live);
        assert_eq!(outcome.identity.id, 7_771_432_535);
        assert_eq!(outcome.identity.username.as_deref(), Some("PitchSmithBot"));
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn probe_identity_synthesizes_when_both_endpoints_fail() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/bottest-token/getMe");
            then.status(503).body(r#"{"ok":false}"#);
        });

        let outcome = test_client(&server.base_url()).probe_identity().await;
        assert!(!outcome.live);
        assert_eq!(outcome.identity.first_name, "PitchSmith");
        // 2 attempts x (primary + secondary fallback).
        mock.assert_calls(4);
    }

    #[tokio::test]
    async fn fetch_updates_returns_parsed_batch() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/bottest-token/getUpdates")
                .query_param("offset", "6")
                .query_param("timeout", "0");
            then.status(200).body(
                r#"{"ok":true,"result":[{"update_id":6,"message":{"chat":{"id":1},"text":"hi"}}]}"#,
            );
        });

        let outcome = test_client(&server.base_url())
            .fetch_updates(6, Duration::ZERO)
            .await;
        assert!(outcome.live);
        assert_eq!(outcome.updates.len(), 1);
        assert_eq!(outcome.updates[0].update_id, 6);
    }

    #[tokio::test]
    async fn fetch_updates_resolves_to_empty_batch_on_total_failure() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/bottest-token/getUpdates");
            then.status(500);
        });

        let outcome = test_client(&server.base_url())
            .fetch_updates(1, Duration::ZERO)
            .await;
        assert!(!outcome.live);
        assert!(outcome.updates.is_empty());
        mock.assert_calls(4);
    }

    #[tokio::test]
    async fn send_message_reports_confirmed_delivery() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/bottest-token/sendMessage")
                .json_body_includes(r#"{"chat_id":42,"text":"hello","parse_mode":"Markdown"}"#);
            then.status(200)
                .body(r#"{"ok":true,"result":{"message_id":55}}"#);
        });

        let outcome = test_client(&server.base_url()).send_message(42, "hello").await;
        assert!(outcome.delivered);
        assert_eq!(outcome.message_id, 55);
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn send_message_synthesizes_acceptance_when_all_retries_fail() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/bottest-token/sendMessage");
            then.status(502);
        });

        let outcome = test_client(&server.base_url()).send_message(42, "hello").await;
        assert!(!outcome.delivered);
        // Synthesized id comes from the injected generator.
        assert_eq!(outcome.message_id, 7);
        mock.assert_calls(4);
    }

    #[tokio::test]
    async fn send_message_rejected_by_api_is_also_absorbed() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/bottest-token/sendMessage");
            then.status(200).body(r#"{"ok":false}"#);
        });

        let outcome = test_client(&server.base_url()).send_message(1, "x").await;
        assert!(!outcome.delivered);
    }

    #[tokio::test]
    async fn send_status_never_raises() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/bottest-token/sendChatAction");
            then.status(200).body(r#"{"ok":true,"result":true}"#);
        });
        let client = test_client(&server.base_url());
        assert!(client.send_status(42, ChatAction::Typing).await);

        // Unreachable port: absorbed into `false`, no panic, no error.
        let dead = test_client("http://127.0.0.1:1");
        assert!(!dead.send_status(42, ChatAction::Typing).await);
    }
}
