//! Chat Message Data Structure
//!
//! The canonical, server-assigned representation of a message plus the
//! request/response bodies of the message endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserProfile;

/// Default page size for message history
pub const DEFAULT_PAGE_LIMIT: i64 = 50;

/// Largest page a client may request
pub const MAX_PAGE_LIMIT: i64 = 100;

/// A message as stored and served by the chat core
///
/// Ids are assigned by the store in strictly increasing insert order, so
/// `id` doubles as the logical clock for read positions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: i64,
    pub chat_id: i64,
    /// Sender
    pub user_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_edited: bool,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub reply_to_id: Option<i64>,
    /// True iff the viewer sent this message and a peer's read position
    /// has reached it. Always false on freshly sent messages.
    #[serde(default)]
    pub is_read_by_peer: bool,
    /// Sender's public profile
    pub user: UserProfile,
}

impl ChatMessage {
    /// Whether `user_id` authored this message
    pub fn is_from(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }
}

/// Body of `POST /:chatId/messages`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default, rename = "replyToId", skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<i64>,
}

impl SendMessageRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reply_to_id: None,
        }
    }

    pub fn replying_to(mut self, message_id: i64) -> Self {
        self.reply_to_id = Some(message_id);
        self
    }
}

/// Response of `POST /:chatId/messages`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub success: bool,
    pub message: ChatMessage,
}

/// Query string of `GET /:chatId/messages`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ListMessagesParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ListMessagesParams {
    /// Page number, at least 1
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Page size, clamped to `1..=MAX_PAGE_LIMIT`
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    /// Number of newest messages to skip
    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

/// Response of `GET /:chatId/messages`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListMessagesResponse {
    pub success: bool,
    /// Chronological (ascending id) order
    pub messages: Vec<ChatMessage>,
}

/// Body of `POST /:chatId/read`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkReadRequest {
    #[serde(default, rename = "messageId")]
    pub message_id: Option<i64>,
}

/// Response of `POST /:chatId/read`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub success: bool,
}

/// A member's read position after a mark-read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadPosition {
    pub message_id: i64,
    pub read_at: DateTime<Utc>,
}
