/**
 * Chat Service
 *
 * Validates callers and input, reads and writes the chat store, and
 * publishes the outcome of every successful write to the relay.
 *
 * # Membership
 *
 * Every operation on a chat first checks that the caller is an active member
 * (`left_at` unset). A failed check is an authorization error, never a
 * not-found, and happens before any mutation.
 *
 * # Timeouts
 *
 * Each store call runs under `store_timeout`. Expiry surfaces as a
 * `TransientStore` error; the caller may retry.
 */

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::error::{BackendError, BackendResult};
use crate::backend::realtime::{Audience, Relay};
use crate::backend::store::{ChatStore, PrivateChatOutcome, StoreResult};
use crate::shared::error::normalize_message_text;
use crate::shared::event::{ReadReceipt, ServerEvent};
use crate::shared::messaging::{
    Chat, ChatListEntry, ChatMessage, ListMessagesParams, PrivatePair, ReadPosition,
    SendMessageRequest, User, UserProfile,
};

/// Default bound on a single store call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Stateless chat operations over a store and a relay
#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn ChatStore>,
    relay: Relay,
    store_timeout: Duration,
}

impl ChatService {
    pub fn new(store: Arc<dyn ChatStore>, relay: Relay, store_timeout: Duration) -> Self {
        Self {
            store,
            relay,
            store_timeout,
        }
    }

    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    /// Run a store call under the store timeout
    async fn guarded<T, F>(&self, operation: &'static str, call: F) -> BackendResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::error!("[Chat] {} failed: {}", operation, e);
                Err(e.into())
            }
            Err(_) => {
                tracing::warn!(
                    "[Chat] {} timed out after {:?}",
                    operation,
                    self.store_timeout
                );
                Err(BackendError::transient(
                    "The data store did not respond in time, please retry",
                ))
            }
        }
    }

    async fn require_member(&self, chat_id: i64, user_id: i64) -> BackendResult<()> {
        let member = self
            .guarded("membership check", self.store.is_active_member(chat_id, user_id))
            .await?;
        if member {
            Ok(())
        } else {
            tracing::debug!("[Chat] User {} denied access to chat {}", user_id, chat_id);
            Err(BackendError::not_a_member())
        }
    }

    /// Confirm a claimed user exists
    pub async fn authenticate(&self, user_id: i64) -> BackendResult<UserProfile> {
        self.guarded("user lookup", self.store.user_profile(user_id))
            .await?
            .ok_or_else(|| BackendError::authentication("User not found"))
    }

    /// Chats the caller actively belongs to, latest activity first
    pub async fn list_chats(&self, user_id: i64) -> BackendResult<Vec<ChatListEntry>> {
        self.guarded("list chats", self.store.list_chats(user_id))
            .await
    }

    /// Every other user, online first, then by name
    pub async fn list_users(&self, user_id: i64) -> BackendResult<Vec<User>> {
        self.guarded("list users", self.store.list_users_except(user_id))
            .await
    }

    /// Return the private chat between the caller and `peer_id`, creating it
    /// with both memberships if none exists. Concurrent calls from both
    /// sides resolve to the same chat.
    pub async fn get_or_create_private_chat(&self, user_id: i64, peer_id: i64) -> BackendResult<Chat> {
        let pair = PrivatePair::new(user_id, peer_id)
            .ok_or_else(|| BackendError::validation("Cannot open a private chat with yourself"))?;

        if self
            .guarded("peer lookup", self.store.user_profile(peer_id))
            .await?
            .is_none()
        {
            return Err(BackendError::not_found("User not found"));
        }

        if let Some(chat) = self
            .guarded("private chat lookup", self.store.find_private_chat(pair))
            .await?
        {
            return Ok(chat);
        }

        let outcome = self
            .guarded(
                "private chat creation",
                self.store.create_private_chat(user_id, pair),
            )
            .await?;
        match &outcome {
            PrivateChatOutcome::Created(chat) => {
                tracing::info!(
                    "[Chat] Created private chat {} for users {} and {}",
                    chat.id,
                    pair.low,
                    pair.high
                );
            }
            PrivateChatOutcome::AlreadyExisted(chat) => {
                tracing::debug!("[Chat] Private chat {} already existed", chat.id);
            }
        }
        Ok(outcome.into_chat())
    }

    /// One page of visible messages in chronological order, annotated with
    /// `is_read_by_peer` for the caller
    pub async fn get_messages(
        &self,
        user_id: i64,
        chat_id: i64,
        params: ListMessagesParams,
    ) -> BackendResult<Vec<ChatMessage>> {
        self.require_member(chat_id, user_id).await?;
        self.guarded(
            "list messages",
            self.store
                .list_messages(chat_id, user_id, params.limit(), params.offset()),
        )
        .await
    }

    /// Persist a message and fan it out as `message:new`
    pub async fn send_message(
        &self,
        user_id: i64,
        chat_id: i64,
        request: SendMessageRequest,
    ) -> BackendResult<ChatMessage> {
        let text = normalize_message_text(&request.text)?;
        self.require_member(chat_id, user_id).await?;

        if let Some(reply_to_id) = request.reply_to_id {
            let reply_chat = self
                .guarded("reply lookup", self.store.message_chat_id(reply_to_id))
                .await?;
            if reply_chat != Some(chat_id) {
                return Err(BackendError::validation(
                    "Reply target must be a message in the same chat",
                ));
            }
        }

        let message = self
            .guarded(
                "insert message",
                self.store
                    .insert_message(chat_id, user_id, &text, request.reply_to_id),
            )
            .await?;

        tracing::info!(
            "[Chat] User {} sent message {} to chat {}",
            user_id,
            message.id,
            chat_id
        );
        self.relay
            .publish(chat_id, ServerEvent::MessageNew(message.clone()))
            .await;
        Ok(message)
    }

    /// Advance the caller's read position and fan out `message:read` to the
    /// other members' connections
    pub async fn mark_read(
        &self,
        user_id: i64,
        chat_id: i64,
        message_id: Option<i64>,
    ) -> BackendResult<ReadPosition> {
        self.require_member(chat_id, user_id).await?;
        let message_id = message_id.ok_or_else(|| BackendError::validation("messageId is required"))?;
        if message_id <= 0 {
            return Err(BackendError::validation("messageId must be positive"));
        }

        let position = self
            .guarded(
                "advance read position",
                self.store
                    .advance_read_position(chat_id, user_id, message_id),
            )
            .await?;

        tracing::debug!(
            "[Chat] User {} read chat {} up to {}",
            user_id,
            chat_id,
            position.message_id
        );
        let receipt = ReadReceipt {
            chat_id,
            message_id: position.message_id,
            reader_id: user_id,
            read_at: position.read_at,
        };
        self.relay
            .publish_to(
                chat_id,
                ServerEvent::MessageRead(receipt),
                Audience::ExceptUser(user_id),
            )
            .await;
        Ok(position)
    }
}
