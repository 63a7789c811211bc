//! Space-Point - Realtime Chat Core
//!
//! The delivery path of a chat application: persist a message, fan it out
//! to every live participant of the chat, and keep each participant's view
//! of the conversation ordered, duplicate-free and read-state accurate.
//!
//! # Module Structure
//!
//! - **`shared`** - Types shared between server and client
//!   - Messages, chats, users and their REST payloads
//!   - Relay event envelopes in both directions
//!   - Client configuration and shared error types
//!
//! - **`backend`** - Server-side code (only compiled with `ssr` feature)
//!   - Axum REST API and realtime relay (WebSocket + SSE)
//!   - Chat service over a Postgres or in-memory store
//!
//! - **`client`** - Client session controller
//!   - Typed REST client and relay stream client
//!   - Per-chat view state with id-based merge
//!
//! # Feature Flags
//!
//! - **`ssr`** - Server modules. Enabled by default.
//!
//! # Usage
//!
//! ```rust,no_run
//! use space_point::backend::server::{create_app, ServerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let app = create_app(ServerConfig::load()?).await;
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3001").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! - `shared::error::SharedError` for wire-level validation
//! - `backend::error::BackendError` for HTTP-facing failures
//! - `client::ClientError` for the client side

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
#[cfg(feature = "ssr")]
pub mod backend;

/// Client session controller
pub mod client;
