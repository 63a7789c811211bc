//! Realtime Relay Module
//!
//! A room-based publish/subscribe hub with one room per chat. The chat
//! service publishes persisted results (`message:new`, `message:read`);
//! clients relay ephemeral signals (`typing`) through it without
//! persistence.
//!
//! # Module Structure
//!
//! ```text
//! realtime/
//! ├── mod.rs          - Module exports and documentation
//! ├── broadcast.rs    - Relay: room registry, fan-out, typing timers
//! ├── session.rs      - Inbound client event dispatch
//! ├── presence.rs     - Presence collaborator interface
//! ├── websocket.rs    - WebSocket transport
//! └── subscription.rs - Server-Sent Events transport + upstream POST
//! ```
//!
//! # Connection Lifecycle
//!
//! `Connecting -> Authenticated -> (joined to zero or more rooms) -> Disconnected`
//!
//! A handshake without a credential is refused with 401 before a connection
//! exists. Room joins are not re-validated against chat membership; the
//! relay only carries events the chat service already authorized.
//!
//! # Transports
//!
//! Both transports sit beneath the same `Relay` API, so the chat service
//! and clients never see which one a connection uses.

/// Room registry and fan-out
pub mod broadcast;

/// Inbound client events
pub mod session;

/// Presence collaborator
pub mod presence;

/// WebSocket transport
pub mod websocket;

/// Server-Sent Events transport
pub mod subscription;

pub use broadcast::{Audience, ConnectionId, Relay, DEFAULT_TYPING_TIMEOUT};
pub use presence::{NoPresence, Presence, StorePresence};
pub use session::{handle_client_event, handle_client_frame};
pub use subscription::{handle_event_stream, handle_upstream_event, HandshakeParams};
pub use websocket::handle_websocket;
