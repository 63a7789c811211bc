/**
 * In-Memory Chat Store
 *
 * Keeps all chat tables inside the process behind a single
 * `tokio::sync::RwLock`. Used when no `DATABASE_URL` is configured and by
 * the test suite.
 *
 * Every write runs under the write lock, which gives the same guarantees the
 * Postgres schema gives through its unique pair index and the conditional
 * read-position update.
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{ChatStore, PrivateChatOutcome, StoreError, StoreResult};
use crate::shared::messaging::{
    chat_list_order, directory_order, Chat, ChatListEntry, ChatMessage, ChatType, PrivatePair,
    ReadPosition, User, UserProfile, PRIVATE_CHAT_TITLE,
};

#[derive(Debug, Clone)]
struct ChatRow {
    chat: Chat,
    pair: Option<PrivatePair>,
}

#[derive(Debug, Clone, Default)]
struct MemberRow {
    left_at: Option<DateTime<Utc>>,
    last_read_message_id: Option<i64>,
    last_read_at: Option<DateTime<Utc>>,
}

impl MemberRow {
    fn is_active(&self) -> bool {
        self.left_at.is_none()
    }
}

#[derive(Debug, Clone)]
struct MessageRow {
    id: i64,
    chat_id: i64,
    user_id: i64,
    text: String,
    created_at: DateTime<Utc>,
    is_edited: bool,
    is_deleted: bool,
    reply_to_id: Option<i64>,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    chats: BTreeMap<i64, ChatRow>,
    members: HashMap<(i64, i64), MemberRow>,
    /// Ascending id order, ids never reused
    messages: Vec<MessageRow>,
    next_user_id: i64,
    next_chat_id: i64,
    next_message_id: i64,
}

impl Tables {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn profile(&self, user_id: i64) -> StoreResult<UserProfile> {
        self.users
            .get(&user_id)
            .map(User::profile)
            .ok_or_else(|| StoreError::Integrity(format!("message author {} missing", user_id)))
    }

    fn to_message(&self, row: &MessageRow, is_read_by_peer: bool) -> StoreResult<ChatMessage> {
        Ok(ChatMessage {
            id: row.id,
            chat_id: row.chat_id,
            user_id: row.user_id,
            text: row.text.clone(),
            created_at: row.created_at,
            is_edited: row.is_edited,
            is_deleted: row.is_deleted,
            reply_to_id: row.reply_to_id,
            is_read_by_peer,
            user: self.profile(row.user_id)?,
        })
    }

    fn active_members(&self, chat_id: i64) -> impl Iterator<Item = (i64, &MemberRow)> {
        self.members
            .iter()
            .filter(move |((chat, _), row)| *chat == chat_id && row.is_active())
            .map(|((_, user), row)| (*user, row))
    }

    fn private_chat(&self, pair: PrivatePair) -> Option<&Chat> {
        self.chats
            .values()
            .find(|row| row.pair == Some(pair))
            .map(|row| &row.chat)
    }
}

/// Chat store kept entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryChatStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user, returning the assigned id
    pub async fn add_user(&self, name: &str, username: &str) -> i64 {
        let mut tables = self.tables.write().await;
        let id = Tables::next_id(&mut tables.next_user_id);
        tables.users.insert(
            id,
            User {
                id,
                name: name.to_string(),
                username: username.to_string(),
                user_avatar: None,
                is_online: false,
                lastlogin_at: None,
            },
        );
        id
    }

    /// Store pre-seeded with `(name, username)` users, ids assigned from 1
    pub async fn with_users(users: &[(&str, &str)]) -> Self {
        let store = Self::new();
        for (name, username) in users {
            store.add_user(name, username).await;
        }
        store
    }

    /// Create a group chat whose first member is the owner
    pub async fn create_group_chat(&self, created_by: i64, title: &str, members: &[i64]) -> Chat {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let id = Tables::next_id(&mut tables.next_chat_id);
        let chat = Chat {
            id,
            chat_type: ChatType::Group,
            title: title.to_string(),
            avatar_url: None,
            created_by,
            created_at: now,
            updated_at: now,
        };
        tables.chats.insert(
            id,
            ChatRow {
                chat: chat.clone(),
                pair: None,
            },
        );
        tables
            .members
            .insert((id, created_by), MemberRow::default());
        for member in members.iter().filter(|m| **m != created_by) {
            tables
                .members
                .insert((id, *member), MemberRow::default());
        }
        chat
    }

    /// Mark a member as having left the chat
    pub async fn remove_member(&self, chat_id: i64, user_id: i64) -> bool {
        let mut tables = self.tables.write().await;
        match tables.members.get_mut(&(chat_id, user_id)) {
            Some(row) if row.is_active() => {
                row.left_at = Some(Utc::now());
                true
            }
            _ => false,
        }
    }

    /// Soft-delete a message
    pub async fn soft_delete_message(&self, message_id: i64) -> bool {
        let mut tables = self.tables.write().await;
        match tables.messages.iter_mut().find(|m| m.id == message_id) {
            Some(row) => {
                row.is_deleted = true;
                true
            }
            None => false,
        }
    }

    /// Number of private chats between a pair, for uniqueness checks
    pub async fn private_chat_count(&self, pair: PrivatePair) -> usize {
        let tables = self.tables.read().await;
        tables
            .chats
            .values()
            .filter(|row| row.pair == Some(pair))
            .count()
    }

    /// Total number of stored messages, deleted ones included
    pub async fn message_count(&self) -> usize {
        self.tables.read().await.messages.len()
    }

    pub async fn last_read_at(&self, chat_id: i64, user_id: i64) -> Option<DateTime<Utc>> {
        let tables = self.tables.read().await;
        tables
            .members
            .get(&(chat_id, user_id))
            .and_then(|row| row.last_read_at)
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn user_profile(&self, user_id: i64) -> StoreResult<Option<UserProfile>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&user_id).map(User::profile))
    }

    async fn list_users_except(&self, user_id: i64) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|user| user.id != user_id)
            .cloned()
            .collect();
        users.sort_by(directory_order);
        Ok(users)
    }

    async fn set_online(&self, user_id: i64, online: bool) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.get_mut(&user_id) {
            user.is_online = online;
            if online {
                user.lastlogin_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn list_chats(&self, user_id: i64) -> StoreResult<Vec<ChatListEntry>> {
        let tables = self.tables.read().await;
        let mut entries: Vec<ChatListEntry> = tables
            .chats
            .values()
            .filter(|row| {
                tables
                    .members
                    .get(&(row.chat.id, user_id))
                    .is_some_and(MemberRow::is_active)
            })
            .map(|row| {
                let latest = tables
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.chat_id == row.chat.id && !m.is_deleted);
                ChatListEntry {
                    chat: row.chat.clone(),
                    last_message: latest.map(|m| m.text.clone()),
                    last_message_time: latest.map(|m| m.created_at),
                }
            })
            .collect();
        entries.sort_by(chat_list_order);
        Ok(entries)
    }

    async fn find_private_chat(&self, pair: PrivatePair) -> StoreResult<Option<Chat>> {
        let tables = self.tables.read().await;
        Ok(tables.private_chat(pair).cloned())
    }

    async fn create_private_chat(
        &self,
        created_by: i64,
        pair: PrivatePair,
    ) -> StoreResult<PrivateChatOutcome> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.private_chat(pair) {
            return Ok(PrivateChatOutcome::AlreadyExisted(existing.clone()));
        }

        let now = Utc::now();
        let id = Tables::next_id(&mut tables.next_chat_id);
        let chat = Chat {
            id,
            chat_type: ChatType::Private,
            title: PRIVATE_CHAT_TITLE.to_string(),
            avatar_url: None,
            created_by,
            created_at: now,
            updated_at: now,
        };
        tables.chats.insert(
            id,
            ChatRow {
                chat: chat.clone(),
                pair: Some(pair),
            },
        );
        for user in [pair.low, pair.high] {
            tables
                .members
                .insert((id, user), MemberRow::default());
        }
        Ok(PrivateChatOutcome::Created(chat))
    }

    async fn is_active_member(&self, chat_id: i64, user_id: i64) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .members
            .get(&(chat_id, user_id))
            .is_some_and(MemberRow::is_active))
    }

    async fn list_messages(
        &self,
        chat_id: i64,
        viewer_id: i64,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<ChatMessage>> {
        let tables = self.tables.read().await;
        let peer_read_upto = tables
            .active_members(chat_id)
            .filter(|(user, _)| *user != viewer_id)
            .filter_map(|(_, row)| row.last_read_message_id)
            .max()
            .unwrap_or(0);

        let mut page = tables
            .messages
            .iter()
            .rev()
            .filter(|m| m.chat_id == chat_id && !m.is_deleted)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|m| tables.to_message(m, m.user_id == viewer_id && m.id <= peer_read_upto))
            .collect::<StoreResult<Vec<_>>>()?;
        page.reverse();
        Ok(page)
    }

    async fn message_chat_id(&self, message_id: i64) -> StoreResult<Option<i64>> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .map(|m| m.chat_id))
    }

    async fn insert_message(
        &self,
        chat_id: i64,
        user_id: i64,
        text: &str,
        reply_to_id: Option<i64>,
    ) -> StoreResult<ChatMessage> {
        let mut tables = self.tables.write().await;
        if !tables.chats.contains_key(&chat_id) {
            return Err(StoreError::Integrity(format!("chat {} missing", chat_id)));
        }
        let id = Tables::next_id(&mut tables.next_message_id);
        let row = MessageRow {
            id,
            chat_id,
            user_id,
            text: text.to_string(),
            created_at: Utc::now(),
            is_edited: false,
            is_deleted: false,
            reply_to_id,
        };
        let message = tables.to_message(&row, false)?;
        tables.messages.push(row);
        Ok(message)
    }

    async fn advance_read_position(
        &self,
        chat_id: i64,
        user_id: i64,
        message_id: i64,
    ) -> StoreResult<ReadPosition> {
        let mut tables = self.tables.write().await;
        let row = tables
            .members
            .get_mut(&(chat_id, user_id))
            .filter(|row| row.is_active())
            .ok_or_else(|| {
                StoreError::Integrity(format!(
                    "no active membership for user {} in chat {}",
                    user_id, chat_id
                ))
            })?;
        let now = Utc::now();
        let position = row
            .last_read_message_id
            .map_or(message_id, |current| current.max(message_id));
        row.last_read_message_id = Some(position);
        row.last_read_at = Some(now);
        Ok(ReadPosition {
            message_id: position,
            read_at: now,
        })
    }

    async fn read_position(&self, chat_id: i64, user_id: i64) -> StoreResult<Option<i64>> {
        let tables = self.tables.read().await;
        Ok(tables
            .members
            .get(&(chat_id, user_id))
            .and_then(|row| row.last_read_message_id))
    }
}
