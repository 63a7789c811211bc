//! Backend Error Module
//!
//! Error types used by the chat service, the HTTP handlers and the relay.
//!
//! # Module Structure
//!
//! ```text
//! error/
//! ├── mod.rs        - Module exports and documentation
//! ├── types.rs      - Error type definitions
//! └── conversion.rs - IntoResponse and extractor rejection conversions
//! ```
//!
//! Handlers return `Result<_, BackendError>`; the error renders itself as a
//! JSON body with the matching status code.

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

pub use types::{BackendError, GENERIC_SERVER_ERROR, STORE_UNAVAILABLE};

/// Result alias used across the backend
pub type BackendResult<T> = Result<T, BackendError>;
