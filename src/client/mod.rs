//! Client Session Controller
//!
//! Keeps the locally held message sequence of the open chat correct and
//! duplicate-free across REST fetches, relay pushes and reconnects.
//!
//! # Module Structure
//!
//! ```text
//! client/
//! ├── mod.rs      - ClientError and re-exports
//! ├── api.rs      - Typed REST client
//! ├── relay.rs    - Relay stream client with reconnect backoff
//! ├── view.rs     - Pure state of one open chat
//! └── session.rs  - SessionController tying them together
//! ```
//!
//! One relay connection is shared by every chat view of a session; opening
//! and closing views only joins and leaves rooms.

use thiserror::Error;

use crate::shared::config::ConfigError;

/// Typed REST client
pub mod api;

/// Relay stream client
pub mod relay;

/// Per-chat view state
pub mod view;

/// Session controller
pub mod session;

pub use api::ChatApi;
pub use relay::{Backoff, RelayClient, RelayNotice, SseDecoder};
pub use session::{SessionController, SessionUpdate};
pub use view::{ChatView, ViewChange, TYPING_QUIET_PERIOD};

/// Client-side errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered `{success: false, message}`
    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("relay is not connected")]
    NotConnected,

    #[error("no chat is open")]
    NoOpenChat,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// HTTP status of an API error
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
