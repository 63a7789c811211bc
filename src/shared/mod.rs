//! Shared Module
//!
//! Types shared between the server and the client session controller. All
//! types are serialized as JSON, either over REST or over the relay.
//!
//! # Overview
//!
//! - **`messaging`** - chats, messages, users
//! - **`event`** - relay envelopes in both directions
//! - **`error`** - errors both sides can raise
//! - **`config`** - client configuration

/// Chat, message and user data structures
pub mod messaging;

/// Real-time event system
pub mod event;

/// Shared error types
pub mod error;

/// Client configuration
pub mod config;

pub use config::{AppConfig, AppConfigBuilder, ConfigError, Credential, USER_ID_HEADER};
pub use error::SharedError;
pub use event::{ClientEvent, ServerEvent};
