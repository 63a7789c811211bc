//! Chat Data Structures
//!
//! A chat is either a private conversation between exactly two users or a
//! group. Chat list entries carry a preview of the latest visible message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Kind of chat
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChatType {
    Private,
    Group,
}

impl ChatType {
    /// Database representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatType::Private => "private",
            ChatType::Group => "group",
        }
    }

    /// Parse the database representation
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "private" => Some(ChatType::Private),
            "group" => Some(ChatType::Group),
            _ => None,
        }
    }
}

/// Title given to newly created private chats
pub const PRIVATE_CHAT_TITLE: &str = "Private Chat";

/// A chat row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: ChatType,
    pub title: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Normalized key of a private chat between two users
///
/// The pair is unordered, so `(a, b)` and `(b, a)` produce the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrivatePair {
    pub low: i64,
    pub high: i64,
}

impl PrivatePair {
    /// Returns `None` when both sides are the same user
    pub fn new(a: i64, b: i64) -> Option<Self> {
        match a.cmp(&b) {
            Ordering::Less => Some(Self { low: a, high: b }),
            Ordering::Greater => Some(Self { low: b, high: a }),
            Ordering::Equal => None,
        }
    }
}

/// A chat in the caller's chat list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatListEntry {
    #[serde(flatten)]
    pub chat: Chat,
    /// Text of the most recent non-deleted message
    pub last_message: Option<String>,
    /// Creation time of the most recent non-deleted message
    pub last_message_time: Option<DateTime<Utc>>,
}

/// Chat list order: latest message first, chats without messages last,
/// ties broken by `updated_at` descending.
pub fn chat_list_order(a: &ChatListEntry, b: &ChatListEntry) -> Ordering {
    match (a.last_message_time, b.last_message_time) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| b.chat.updated_at.cmp(&a.chat.updated_at))
}

/// Response of `GET /chats`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListChatsResponse {
    pub success: bool,
    pub chats: Vec<ChatListEntry>,
}

/// Response of `GET /private/:peerId`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateChatResponse {
    pub success: bool,
    pub chat: Chat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(id: i64, last: Option<i64>, updated: i64) -> ChatListEntry {
        let at = |secs: i64| Utc.timestamp_opt(secs, 0).unwrap();
        ChatListEntry {
            chat: Chat {
                id,
                chat_type: ChatType::Private,
                title: PRIVATE_CHAT_TITLE.to_string(),
                avatar_url: None,
                created_by: 1,
                created_at: at(0),
                updated_at: at(updated),
            },
            last_message: last.map(|_| "hi".to_string()),
            last_message_time: last.map(at),
        }
    }

    #[test]
    fn test_private_pair_is_unordered() {
        assert_eq!(PrivatePair::new(1, 2), PrivatePair::new(2, 1));
        assert!(PrivatePair::new(5, 5).is_none());
    }

    #[test]
    fn test_chat_list_order() {
        let mut entries = vec![
            entry(1, None, 50),
            entry(2, Some(10), 0),
            entry(3, Some(30), 0),
            entry(4, None, 90),
        ];
        entries.sort_by(chat_list_order);
        let ids: Vec<i64> = entries.iter().map(|e| e.chat.id).collect();
        assert_eq!(ids, vec![3, 2, 4, 1]);
    }

    #[test]
    fn test_chat_type_serializes_as_type_field() {
        let json = serde_json::to_value(entry(9, Some(1), 1)).unwrap();
        assert_eq!(json["type"], "private");
        assert_eq!(json["id"], 9);
        assert_eq!(json["last_message"], "hi");
    }
}
