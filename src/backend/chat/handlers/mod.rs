//! Chat REST Handlers
//!
//! Thin axum handlers over [`ChatService`](crate::backend::chat::ChatService).
//! Every handler runs behind the auth middleware and receives the caller as
//! [`AuthUser`](crate::backend::middleware::AuthUser).
//!
//! Extractor rejections (bad path id, malformed JSON body, bad query) are
//! turned into `400` responses with the standard error body.
//!
//! # Endpoints
//!
//! | Method | Path                          | Handler           |
//! |--------|-------------------------------|-------------------|
//! | GET    | `/api/chat/chats`             | `list_chats`      |
//! | GET    | `/api/chat/users`             | `list_users`      |
//! | GET    | `/api/chat/private/{peerId}`  | `private_chat`    |
//! | GET    | `/api/chat/{chatId}/messages` | `list_messages`   |
//! | POST   | `/api/chat/{chatId}/messages` | `send_message`    |
//! | POST   | `/api/chat/{chatId}/read`     | `mark_read`       |

/// Chat list, user directory and private chats
pub mod chats;

/// Message history, sending and read positions
pub mod messages;

pub use chats::{health, list_chats, list_users, private_chat};
pub use messages::{list_messages, mark_read, send_message};
