//! Persistence Store
//!
//! The source of truth for chats, memberships, messages and read positions.
//! The chat service talks to storage only through the [`ChatStore`] trait.
//!
//! # Module Structure
//!
//! ```text
//! store/
//! ├── mod.rs      - ChatStore trait, StoreError, PrivateChatOutcome
//! ├── postgres.rs - PgChatStore (sqlx, production)
//! └── memory.rs   - MemoryChatStore (no database configured, tests)
//! ```
//!
//! # Invariants
//!
//! - At most one private chat exists per unordered user pair. Both
//!   implementations enforce this at creation time, never by lookup alone.
//! - A member's `last_read_message_id` never decreases.
//! - Soft-deleted messages are kept but never returned by history reads.
//! - Members with `left_at` set are invisible to every membership check.

use async_trait::async_trait;
use thiserror::Error;

use crate::shared::messaging::{
    Chat, ChatListEntry, ChatMessage, PrivatePair, ReadPosition, User, UserProfile,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryChatStore;
pub use postgres::PgChatStore;

/// Storage failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// A uniqueness constraint rejected the write
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Connection lost, pool exhausted or call timed out
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Stored data breaks an assumption of the schema
    #[error("integrity error: {0}")]
    Integrity(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::UniqueViolation(db.message().to_string())
            }
            _ => StoreError::Database(err),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a private chat creation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivateChatOutcome {
    /// This call created the chat and both memberships
    Created(Chat),
    /// A concurrent caller won the race; this is their chat
    AlreadyExisted(Chat),
}

impl PrivateChatOutcome {
    pub fn into_chat(self) -> Chat {
        match self {
            PrivateChatOutcome::Created(chat) | PrivateChatOutcome::AlreadyExisted(chat) => chat,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, PrivateChatOutcome::Created(_))
    }
}

/// Storage seam of the chat core
///
/// Implementations must be safe for concurrent use from many request
/// handlers at once.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Public profile of a user, `None` if the user does not exist
    async fn user_profile(&self, user_id: i64) -> StoreResult<Option<UserProfile>>;

    /// Every user except `user_id`, online first, then by name
    async fn list_users_except(&self, user_id: i64) -> StoreResult<Vec<User>>;

    /// Flip a user's online flag (presence collaborator)
    async fn set_online(&self, user_id: i64, online: bool) -> StoreResult<()>;

    /// Chats the user actively belongs to, with their latest visible message,
    /// in chat list order
    async fn list_chats(&self, user_id: i64) -> StoreResult<Vec<ChatListEntry>>;

    /// The private chat of a pair, if one exists
    async fn find_private_chat(&self, pair: PrivatePair) -> StoreResult<Option<Chat>>;

    /// Atomically create a private chat plus both memberships. A lost race
    /// yields `AlreadyExisted` with the winner's chat, never an error.
    async fn create_private_chat(
        &self,
        created_by: i64,
        pair: PrivatePair,
    ) -> StoreResult<PrivateChatOutcome>;

    /// Whether the user is a member of the chat with `left_at` unset
    async fn is_active_member(&self, chat_id: i64, user_id: i64) -> StoreResult<bool>;

    /// Up to `limit` newest visible messages after skipping `offset`, returned
    /// in ascending id order with `is_read_by_peer` computed for `viewer_id`
    async fn list_messages(
        &self,
        chat_id: i64,
        viewer_id: i64,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<ChatMessage>>;

    /// Chat a message belongs to, `None` if the message does not exist
    async fn message_chat_id(&self, message_id: i64) -> StoreResult<Option<i64>>;

    /// Insert a message and return it joined with the sender's profile
    async fn insert_message(
        &self,
        chat_id: i64,
        user_id: i64,
        text: &str,
        reply_to_id: Option<i64>,
    ) -> StoreResult<ChatMessage>;

    /// Set the member's read position to `max(current, message_id)` and
    /// return the resulting position
    async fn advance_read_position(
        &self,
        chat_id: i64,
        user_id: i64,
        message_id: i64,
    ) -> StoreResult<ReadPosition>;

    /// Current read position of a member
    async fn read_position(&self, chat_id: i64, user_id: i64) -> StoreResult<Option<i64>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_unavailable() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_row_not_found_is_database_error() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
    }
}
