//! Chat Backend Module
//!
//! Chat, message and read-position operations.
//!
//! # Architecture
//!
//! - **`service`** - `ChatService`: membership gate, validation, store calls
//!   under a timeout, relay publishing after successful writes
//! - **`handlers`** - axum handlers for the `/api/chat` REST surface
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use space_point::backend::chat::{ChatService, DEFAULT_STORE_TIMEOUT};
//! use space_point::backend::realtime::Relay;
//! use space_point::backend::store::MemoryChatStore;
//! use space_point::shared::messaging::SendMessageRequest;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryChatStore::with_users(&[("Alice", "alice"), ("Bob", "bob")]).await;
//! let chat = ChatService::new(Arc::new(store), Relay::without_presence(), DEFAULT_STORE_TIMEOUT);
//!
//! let private = chat.get_or_create_private_chat(1, 2).await?;
//! let message = chat.send_message(1, private.id, SendMessageRequest::new("hi")).await?;
//! # Ok(())
//! # }
//! ```

/// Chat operations
pub mod service;

/// REST handlers
pub mod handlers;

pub use service::{ChatService, DEFAULT_STORE_TIMEOUT};
