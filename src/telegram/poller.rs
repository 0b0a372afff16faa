//! Long-poll update loop with watermark tracking.
//!
//! The poller bootstraps by probing the bot identity with exponential
//! backoff, then drives `getUpdates` forever: each batch advances a
//! monotonic high-water mark and feeds messages to the dispatcher strictly
//! sequentially in arrival order. If the identity probe keeps failing past
//! the attempt budget the loop starts anyway in degraded mode — the system
//! makes forward progress rather than refusing to serve.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::TelegramConfig;
use crate::dispatch::Dispatcher;

use super::client::TelegramClient;
use super::types::{IncomingMessage, Update};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Disconnected,
    Connecting,
    Polling,
}

pub struct UpdatePoller {
    client: Arc<TelegramClient>,
    dispatcher: Dispatcher,
    stop: Arc<AtomicBool>,
    state: PollerState,
    /// Highest update id already processed. Never rewound.
    last_processed: i64,
    poll_timeout: Duration,
    poll_interval: Duration,
    fetch_error_delay: Duration,
    bootstrap_max_attempts: u32,
    bootstrap_base_delay: Duration,
}

impl UpdatePoller {
    pub fn new(
        config: &TelegramConfig,
        client: Arc<TelegramClient>,
        dispatcher: Dispatcher,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            client,
            dispatcher,
            stop,
            state: PollerState::Disconnected,
            last_processed: 0,
            poll_timeout: Duration::from_secs(config.poll_timeout_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            fetch_error_delay: Duration::from_millis(config.fetch_error_delay_ms),
            bootstrap_max_attempts: config.bootstrap_max_attempts,
            bootstrap_base_delay: Duration::from_millis(config.bootstrap_base_delay_ms),
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn watermark(&self) -> i64 {
        self.last_processed
    }

    /// Run until the stop flag is raised. The flag is consulted once per
    /// loop iteration; an in-flight fetch is never aborted.
    pub async fn run(&mut self) {
        self.bootstrap().await;

        info!("starting polling loop");
        while !self.stop.load(Ordering::Relaxed) {
            let live = self.poll_once().await;
            if !live {
                tokio::time::sleep(self.fetch_error_delay).await;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        self.state = PollerState::Disconnected;
        info!("polling stopped");
    }

    /// Probe the bot identity with exponential backoff, entering degraded
    /// mode once the attempt budget is exhausted.
    async fn bootstrap(&mut self) {
        self.state = PollerState::Connecting;
        let mut attempts: u32 = 0;
        loop {
            if self.stop.load(Ordering::Relaxed) {
                return;
            }
            let probe = self.client.probe_identity().await;
            if probe.live {
                info!(
                    bot = %probe.identity.first_name,
                    username = probe.identity.username.as_deref().unwrap_or("-"),
                    "bot connected"
                );
                self.state = PollerState::Polling;
                return;
            }

            attempts += 1;
            if attempts >= self.bootstrap_max_attempts {
                warn!(
                    attempts,
                    "could not reach the platform, starting in degraded mode"
                );
                self.state = PollerState::Polling;
                return;
            }

            let delay = self
                .bootstrap_base_delay
                .saturating_mul(2u32.saturating_pow(attempts - 1));
            warn!(
                attempt = attempts,
                max = self.bootstrap_max_attempts,
                delay_ms = delay.as_millis() as u64,
                "identity probe failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One fetch-and-dispatch iteration. Returns whether the fetch reached
    /// the platform.
    pub async fn poll_once(&mut self) -> bool {
        let outcome = self
            .client
            .fetch_updates(self.last_processed + 1, self.poll_timeout)
            .await;

        let messages = self.ingest(outcome.updates);
        for message in messages {
            // Strictly sequential: the next message is not touched until
            // the dispatcher finishes this one.
            self.dispatcher.handle(message).await;
        }

        if !outcome.live {
            warn!(watermark = self.last_processed, "update fetch degraded");
        }
        outcome.live
    }

    /// Advance the watermark over a batch and keep the messages worth
    /// dispatching. An update at or below the watermark was already
    /// processed and is skipped; the watermark itself never decreases.
    fn ingest(&mut self, updates: Vec<Update>) -> Vec<IncomingMessage> {
        let mut messages = Vec::new();
        for update in updates {
            if update.update_id <= self.last_processed {
                debug!(
                    update_id = update.update_id,
                    watermark = self.last_processed,
                    "skipping already-processed update"
                );
                continue;
            }
            self.last_processed = update.update_id;
            if let Some(message) = update.message {
                messages.push(message);
            }
        }
        messages
    }
}
