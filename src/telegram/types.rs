//! Telegram Bot API wire types and client-facing outcome values.

use serde::{Deserialize, Serialize};

/// Standard Bot API response envelope: `{"ok": bool, "result": ...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub ok: bool,
    pub result: Option<T>,
}

/// Result of `getMe`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotIdentity {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// One entry from `getUpdates`. Update ids are platform-assigned and
/// monotonically non-decreasing across the stream, but not contiguous.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// `sendChatAction` indicator variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAction {
    Typing,
    UploadPhoto,
    RecordVideo,
    UploadDocument,
}

impl ChatAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatAction::Typing => "typing",
            ChatAction::UploadPhoto => "upload_photo",
            ChatAction::RecordVideo => "record_video",
            ChatAction::UploadDocument => "upload_document",
        }
    }
}

/// Outcome of `probe_identity`. `live` is false when both endpoints failed
/// and the identity was synthesized.
#[derive(Debug, Clone)]
pub struct IdentityOutcome {
    pub identity: BotIdentity,
    pub live: bool,
}

/// Outcome of `fetch_updates`. `live` is false when both endpoints failed;
/// the batch is then empty.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub updates: Vec<Update>,
    pub live: bool,
}

/// Outcome of `send_message`. `delivered` is false when both endpoints
/// failed and the accepted result was synthesized; delivery is then
/// best-effort at-most-once and cannot be confirmed.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub message_id: i64,
    pub delivered: bool,
}
