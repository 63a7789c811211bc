//! PostgreSQL chat store
//!
//! Production implementation of [`ChatStore`] over a `sqlx::PgPool`. The
//! schema lives in `migrations/`.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, PgPool, Row};

use super::{ChatStore, PrivateChatOutcome, StoreError, StoreResult};
use crate::shared::messaging::{
    Chat, ChatListEntry, ChatMessage, ChatType, PrivatePair, ReadPosition, User, UserProfile,
    PRIVATE_CHAT_TITLE,
};

/// Chat store backed by PostgreSQL
#[derive(Debug, Clone)]
pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn chat_from_row(row: &PgRow) -> StoreResult<Chat> {
    let kind: String = row.try_get("type")?;
    let chat_type = ChatType::parse(&kind)
        .ok_or_else(|| StoreError::Integrity(format!("unknown chat type '{}'", kind)))?;
    Ok(Chat {
        id: row.try_get("id")?,
        chat_type,
        title: row.try_get("title")?,
        avatar_url: row.try_get("avatar_url")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn message_from_row(row: &PgRow) -> StoreResult<ChatMessage> {
    Ok(ChatMessage {
        id: row.try_get("id")?,
        chat_id: row.try_get("chat_id")?,
        user_id: row.try_get("user_id")?,
        text: row.try_get("text")?,
        created_at: row.try_get("created_at")?,
        is_edited: row.try_get("is_edited")?,
        is_deleted: row.try_get("is_deleted")?,
        reply_to_id: row.try_get("reply_to_id")?,
        is_read_by_peer: row.try_get("is_read_by_peer")?,
        user: UserProfile {
            id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            username: row.try_get("username")?,
            user_avatar: row.try_get("user_avatar")?,
        },
    })
}

const CHAT_COLUMNS: &str =
    "c.id, c.type, c.title, c.avatar_url, c.created_by, c.created_at, c.updated_at";

#[async_trait]
impl ChatStore for PgChatStore {
    async fn user_profile(&self, user_id: i64) -> StoreResult<Option<UserProfile>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, username, user_avatar
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> StoreResult<UserProfile> {
            Ok(UserProfile {
                id: r.try_get("id")?,
                name: r.try_get("name")?,
                username: r.try_get("username")?,
                user_avatar: r.try_get("user_avatar")?,
            })
        })
        .transpose()
    }

    async fn list_users_except(&self, user_id: i64) -> StoreResult<Vec<User>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, username, user_avatar, is_online, lastlogin_at
            FROM users
            WHERE id <> $1
            ORDER BY is_online DESC, name ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> StoreResult<User> {
                Ok(User {
                    id: r.try_get("id")?,
                    name: r.try_get("name")?,
                    username: r.try_get("username")?,
                    user_avatar: r.try_get("user_avatar")?,
                    is_online: r.try_get("is_online")?,
                    lastlogin_at: r.try_get("lastlogin_at")?,
                })
            })
            .collect()
    }

    async fn set_online(&self, user_id: i64, online: bool) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET is_online = $2,
                lastlogin_at = CASE WHEN $2 THEN NOW() ELSE lastlogin_at END
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(online)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_chats(&self, user_id: i64) -> StoreResult<Vec<ChatListEntry>> {
        let sql = format!(
            r#"
            SELECT {CHAT_COLUMNS},
                   lm.text AS last_message,
                   lm.created_at AS last_message_time
            FROM chats c
            JOIN chat_members cm
              ON cm.chat_id = c.id AND cm.user_id = $1 AND cm.left_at IS NULL
            LEFT JOIN LATERAL (
                SELECT m.text, m.created_at
                FROM messages m
                WHERE m.chat_id = c.id AND m.is_deleted = FALSE
                ORDER BY m.id DESC
                LIMIT 1
            ) lm ON TRUE
            ORDER BY last_message_time DESC NULLS LAST, c.updated_at DESC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|r| -> StoreResult<ChatListEntry> {
                Ok(ChatListEntry {
                    chat: chat_from_row(r)?,
                    last_message: r.try_get("last_message")?,
                    last_message_time: r.try_get("last_message_time")?,
                })
            })
            .collect()
    }

    async fn find_private_chat(&self, pair: PrivatePair) -> StoreResult<Option<Chat>> {
        let sql = format!(
            r#"
            SELECT {CHAT_COLUMNS}
            FROM chats c
            WHERE c.type = 'private' AND c.private_low = $1 AND c.private_high = $2
            "#
        );
        let row = sqlx::query(&sql)
            .bind(pair.low)
            .bind(pair.high)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(chat_from_row).transpose()
    }

    async fn create_private_chat(
        &self,
        created_by: i64,
        pair: PrivatePair,
    ) -> StoreResult<PrivateChatOutcome> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO chats (type, title, created_by, private_low, private_high)
            VALUES ('private', $1, $2, $3, $4)
            RETURNING id, type, title, avatar_url, created_by, created_at, updated_at
            "#,
        )
        .bind(PRIVATE_CHAT_TITLE)
        .bind(created_by)
        .bind(pair.low)
        .bind(pair.high)
        .fetch_one(&mut *tx)
        .await
        .map_err(StoreError::from);

        let chat = match inserted {
            Ok(row) => chat_from_row(&row)?,
            Err(StoreError::UniqueViolation(detail)) => {
                tx.rollback().await?;
                tracing::info!(
                    "[Store] Private chat {}-{} created concurrently, re-fetching",
                    pair.low,
                    pair.high
                );
                return match self.find_private_chat(pair).await? {
                    Some(existing) => Ok(PrivateChatOutcome::AlreadyExisted(existing)),
                    None => Err(StoreError::UniqueViolation(detail)),
                };
            }
            Err(e) => return Err(e),
        };

        sqlx::query(
            r#"
            INSERT INTO chat_members (chat_id, user_id, role, joined_at)
            VALUES ($1, $2, 'member', $4), ($1, $3, 'member', $4)
            "#,
        )
        .bind(chat.id)
        .bind(pair.low)
        .bind(pair.high)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!("[Store] Created private chat {}", chat.id);
        Ok(PrivateChatOutcome::Created(chat))
    }

    async fn is_active_member(&self, chat_id: i64, user_id: i64) -> StoreResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT 1 AS present
            FROM chat_members
            WHERE chat_id = $1 AND user_id = $2 AND left_at IS NULL
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn list_messages(
        &self,
        chat_id: i64,
        viewer_id: i64,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<ChatMessage>> {
        let rows = sqlx::query(
            r#"
            WITH peer AS (
                SELECT COALESCE(MAX(last_read_message_id), 0) AS read_upto
                FROM chat_members
                WHERE chat_id = $1 AND user_id <> $2 AND left_at IS NULL
            )
            SELECT m.id, m.chat_id, m.user_id, m.text, m.created_at,
                   m.is_edited, m.is_deleted, m.reply_to_id,
                   (m.user_id = $2 AND m.id <= peer.read_upto) AS is_read_by_peer,
                   u.name, u.username, u.user_avatar
            FROM messages m
            JOIN users u ON u.id = m.user_id
            CROSS JOIN peer
            WHERE m.chat_id = $1 AND m.is_deleted = FALSE
            ORDER BY m.id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(chat_id)
        .bind(viewer_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let mut messages = rows
            .iter()
            .map(message_from_row)
            .collect::<StoreResult<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }

    async fn message_chat_id(&self, message_id: i64) -> StoreResult<Option<i64>> {
        let row = sqlx::query("SELECT chat_id FROM messages WHERE id = $1")
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.try_get::<i64, _>("chat_id")).transpose()?)
    }

    async fn insert_message(
        &self,
        chat_id: i64,
        user_id: i64,
        text: &str,
        reply_to_id: Option<i64>,
    ) -> StoreResult<ChatMessage> {
        let row = sqlx::query(
            r#"
            WITH inserted AS (
                INSERT INTO messages (chat_id, user_id, text, reply_to_id)
                VALUES ($1, $2, $3, $4)
                RETURNING id, chat_id, user_id, text, created_at, is_edited, is_deleted, reply_to_id
            )
            SELECT i.*, FALSE AS is_read_by_peer, u.name, u.username, u.user_avatar
            FROM inserted i
            JOIN users u ON u.id = i.user_id
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(text)
        .bind(reply_to_id)
        .fetch_one(&self.pool)
        .await?;

        message_from_row(&row)
    }

    async fn advance_read_position(
        &self,
        chat_id: i64,
        user_id: i64,
        message_id: i64,
    ) -> StoreResult<ReadPosition> {
        let row = sqlx::query(
            r#"
            UPDATE chat_members
            SET last_read_message_id = GREATEST(COALESCE(last_read_message_id, 0), $3),
                last_read_at = NOW()
            WHERE chat_id = $1 AND user_id = $2 AND left_at IS NULL
            RETURNING last_read_message_id, last_read_at
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            StoreError::Integrity(format!(
                "no active membership for user {} in chat {}",
                user_id, chat_id
            ))
        })?;

        Ok(ReadPosition {
            message_id: row.try_get("last_read_message_id")?,
            read_at: row.try_get("last_read_at")?,
        })
    }

    async fn read_position(&self, chat_id: i64, user_id: i64) -> StoreResult<Option<i64>> {
        let row = sqlx::query(
            r#"
            SELECT last_read_message_id
            FROM chat_members
            WHERE chat_id = $1 AND user_id = $2
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row
            .map(|r| r.try_get::<Option<i64>, _>("last_read_message_id"))
            .transpose()?
            .flatten())
    }
}
