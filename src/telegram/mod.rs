//! Resilient update-polling gateway for the Telegram Bot API.

pub mod client;
pub mod poller;
pub mod types;

pub use client::{RetryPolicy, TelegramClient};
pub use poller::{PollerState, UpdatePoller};
pub use types::{
    BotIdentity, Chat, ChatAction, FetchOutcome, IdentityOutcome, IncomingMessage, SendOutcome,
    Update, User,
};
