//! Messaging Module
//!
//! Data structures of the chat core that travel over REST:
//!
//! - `Chat` / `ChatListEntry` - chats and the caller's chat list
//! - `ChatMessage` - the canonical message
//! - `User` / `UserProfile` - read-only projections of identity-owned users
//!
//! # Usage
//!
//! ```rust
//! use space_point::shared::messaging::{Chat, ChatMessage, User};
//! ```

pub mod chat;
pub mod message;
pub mod user;

pub use chat::{
    chat_list_order, Chat, ChatListEntry, ChatType, ListChatsResponse, PrivateChatResponse,
    PrivatePair, PRIVATE_CHAT_TITLE,
};
pub use message::{
    ChatMessage, ListMessagesParams, ListMessagesResponse, MarkReadRequest, MarkReadResponse,
    ReadPosition, SendMessageRequest, SendMessageResponse, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT,
};
pub use user::{directory_order, ListUsersResponse, User, UserProfile};
