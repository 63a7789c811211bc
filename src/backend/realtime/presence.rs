//! Presence collaborator
//!
//! The relay reports a user's first connection and last disconnection here.
//! What "online" means is up to the implementation.

use async_trait::async_trait;
use std::sync::Arc;

use crate::backend::store::ChatStore;

#[async_trait]
pub trait Presence: Send + Sync {
    /// The user opened their first relay connection
    async fn connected(&self, user_id: i64);

    /// The user's last relay connection closed
    async fn disconnected(&self, user_id: i64);
}

/// Presence that ignores every transition
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPresence;

#[async_trait]
impl Presence for NoPresence {
    async fn connected(&self, _user_id: i64) {}

    async fn disconnected(&self, _user_id: i64) {}
}

/// Presence that flips `is_online` in the chat store
#[derive(Clone)]
pub struct StorePresence {
    store: Arc<dyn ChatStore>,
}

impl StorePresence {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }

    async fn set(&self, user_id: i64, online: bool) {
        if let Err(e) = self.store.set_online(user_id, online).await {
            tracing::warn!(
                "[Relay] Failed to mark user {} {}: {}",
                user_id,
                if online { "online" } else { "offline" },
                e
            );
        }
    }
}

#[async_trait]
impl Presence for StorePresence {
    async fn connected(&self, user_id: i64) {
        self.set(user_id, true).await;
    }

    async fn disconnected(&self, user_id: i64) {
        self.set(user_id, false).await;
    }
}
