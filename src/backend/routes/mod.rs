//! Route Configuration Module
//!
//! This module configures all HTTP routes for the backend server.
//!
//! - **`router`** - Main router creation, CORS and tracing layers
//! - **`chat_routes`** - Realtime relay routes (WebSocket, SSE, upstream)
//! - **`api_routes`** - REST endpoints (health, chat API)
//!
//! # Module Structure
//!
//! ```text
//! routes/
//! ├── mod.rs          - Module exports and documentation
//! ├── router.rs       - Main router creation
//! ├── chat_routes.rs  - Realtime relay routes
//! └── api_routes.rs   - REST endpoints
//! ```
//!
//! # Errors
//!
//! Every error response, including unknown routes, is
//! `{"success": false, "message": "..."}`.

/// Main router creation
pub mod router;

/// Realtime relay routes
pub mod chat_routes;

/// REST endpoints
pub mod api_routes;

pub use router::create_router;
