//! Backend Module
//!
//! This module contains all server-side code for Space-Point: the chat REST
//! API, the realtime relay and the persistence store behind them.
//!
//! This module is only compiled when the `ssr` feature is enabled.
//!
//! # Architecture
//!
//! - **`server`** - Server initialization, application state, configuration
//! - **`routes`** - HTTP route configuration and router assembly
//! - **`chat`** - Chat service and REST handlers
//! - **`realtime`** - Room-based relay with WebSocket and SSE transports
//! - **`store`** - Persistence store trait, Postgres and in-memory backends
//! - **`auth`** - Caller identity (trusted user id or JWT)
//! - **`middleware`** - Request processing middleware
//! - **`error`** - Backend error taxonomy and HTTP mapping
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs          - Module exports and documentation
//! ├── server/         - Server initialization and state
//! ├── routes/         - Route configuration
//! ├── chat/           - Chat service and handlers
//! ├── realtime/       - Relay and transports
//! ├── store/          - Persistence
//! ├── auth/           - Identity
//! ├── middleware/     - Request middleware
//! └── error/          - Error types
//! ```
//!
//! # Data Flow
//!
//! A write goes handler -> `ChatService` -> `ChatStore`, and only after the
//! store succeeds does the service publish to the relay room of the chat.
//! Typing signals and client read echoes go client -> relay -> room and
//! never touch the store.

/// Server setup and configuration
#[cfg(feature = "ssr")]
pub mod server;

/// Route configuration
#[cfg(feature = "ssr")]
pub mod routes;

/// Chat service and handlers
#[cfg(feature = "ssr")]
pub mod chat;

/// Real-time relay
#[cfg(feature = "ssr")]
pub mod realtime;

/// Persistence store
#[cfg(feature = "ssr")]
pub mod store;

/// Backend error types
#[cfg(feature = "ssr")]
pub mod error;

/// Caller identity
#[cfg(feature = "ssr")]
pub mod auth;

/// Middleware for request processing
#[cfg(feature = "ssr")]
pub mod middleware;

#[cfg(feature = "ssr")]
pub use chat::ChatService;
#[cfg(feature = "ssr")]
pub use error::BackendError;
#[cfg(feature = "ssr")]
pub use realtime::Relay;
#[cfg(feature = "ssr")]
pub use server::{build_state, create_app, AppState, ServerConfig};
#[cfg(feature = "ssr")]
pub use store::{ChatStore, MemoryChatStore, PgChatStore};
