/**
 * Real-time Event System
 *
 * Events exchanged with the relay. Every frame, in either direction, is an
 * envelope `{"event": "<name>", "data": <payload>}`.
 *
 * Client events: `chat:join`, `chat:leave`, `typing:start`, `typing:stop`,
 * `message:read`.
 *
 * Server events: `connected`, `message:new`, `message:read`, `typing`.
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::shared::messaging::ChatMessage;

/// Accepts ids sent either as JSON numbers or numeric strings
fn lenient_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Room identifier carried by join/leave
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct RoomId(pub i64);

impl<'de> Deserialize<'de> for RoomId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        lenient_id(deserializer).map(RoomId)
    }
}

/// Payload `{chatId}`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRef {
    #[serde(deserialize_with = "lenient_id")]
    pub chat_id: i64,
}

/// Payload `{chatId, messageId}` of the client read echo
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReadEcho {
    #[serde(deserialize_with = "lenient_id")]
    pub chat_id: i64,
    #[serde(deserialize_with = "lenient_id")]
    pub message_id: i64,
}

/// Event sent by a client to the relay
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "chat:join")]
    Join(RoomId),
    #[serde(rename = "chat:leave")]
    Leave(RoomId),
    #[serde(rename = "typing:start")]
    TypingStart(ChatRef),
    #[serde(rename = "typing:stop")]
    TypingStop(ChatRef),
    #[serde(rename = "message:read")]
    MessageRead(ReadEcho),
}

impl ClientEvent {
    pub fn join(chat_id: i64) -> Self {
        Self::Join(RoomId(chat_id))
    }

    pub fn leave(chat_id: i64) -> Self {
        Self::Leave(RoomId(chat_id))
    }

    pub fn typing(chat_id: i64, is_typing: bool) -> Self {
        let chat = ChatRef { chat_id };
        if is_typing {
            Self::TypingStart(chat)
        } else {
            Self::TypingStop(chat)
        }
    }

    /// Parse a raw frame. Malformed frames (unknown event, missing
    /// `chatId`, bad JSON) yield `None` and are meant to be ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str(raw) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::debug!("[Relay] Ignoring malformed client event: {}", e);
                None
            }
        }
    }
}

/// Sent once on stream transports so the client learns its connection id
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Connected {
    pub connection_id: Uuid,
    pub user_id: i64,
}

/// Read receipt fanned out after a read position advances
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub chat_id: i64,
    pub message_id: i64,
    pub reader_id: i64,
    pub read_at: DateTime<Utc>,
}

/// Typing indicator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypingSignal {
    pub chat_id: i64,
    pub user_id: i64,
    pub is_typing: bool,
}

/// Event pushed by the relay to connections
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "connected")]
    Connected(Connected),
    #[serde(rename = "message:new")]
    MessageNew(ChatMessage),
    #[serde(rename = "message:read")]
    MessageRead(ReadReceipt),
    #[serde(rename = "typing")]
    Typing(TypingSignal),
}

impl ServerEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected(_) => "connected",
            ServerEvent::MessageNew(_) => "message:new",
            ServerEvent::MessageRead(_) => "message:read",
            ServerEvent::Typing(_) => "typing",
        }
    }

    /// Chat the event belongs to, if any
    pub fn chat_id(&self) -> Option<i64> {
        match self {
            ServerEvent::Connected(_) => None,
            ServerEvent::MessageNew(message) => Some(message.chat_id),
            ServerEvent::MessageRead(receipt) => Some(receipt.chat_id),
            ServerEvent::Typing(signal) => Some(signal.chat_id),
        }
    }
}
