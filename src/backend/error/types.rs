/**
 * Backend Error Types
 *
 * The error taxonomy of the chat core. Every variant maps to one HTTP status
 * and renders as `{"success": false, "message": ...}`.
 *
 * # Error Categories
 *
 * - `Validation` - bad or missing input (400)
 * - `Authentication` - no or invalid identity (401)
 * - `Authorization` - authenticated but not an active chat member (403)
 * - `NotFound` - referenced entity absent (404)
 * - `Conflict` - duplicate creation race the re-fetch could not resolve (500)
 * - `TransientStore` - store timeout or lost connection (500, safe to retry)
 * - `Store` - any other storage failure (500)
 *
 * Store-side detail is kept on the variant for logging; callers only ever
 * see the fixed messages below.
 */

use axum::http::StatusCode;
use thiserror::Error;

use crate::backend::store::StoreError;
use crate::shared::SharedError;

/// Message returned for failures whose detail must not leak
pub const GENERIC_SERVER_ERROR: &str = "Internal server error";

/// Message returned for store timeouts and lost connections
pub const STORE_UNAVAILABLE: &str = "The data store is unavailable, please retry";

/// Backend-specific error types
///
/// # Usage
///
/// ```rust
/// use space_point::backend::error::BackendError;
///
/// let err = BackendError::validation("Message text cannot be empty");
/// let err = BackendError::authorization("You do not have access to this chat");
/// ```
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Authentication error: {message}")]
    Authentication { message: String },

    #[error("Authorization error: {message}")]
    Authorization { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Transient store error: {message}")]
    TransientStore { message: String },

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error(transparent)]
    SharedError(#[from] SharedError),
}

impl BackendError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientStore {
            message: message.into(),
        }
    }

    /// Denial used by every membership gate
    pub fn not_a_member() -> Self {
        Self::authorization("You do not have access to this chat")
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Authentication { .. } => StatusCode::UNAUTHORIZED,
            Self::Authorization { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } | Self::TransientStore { .. } | Self::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::SharedError(err) => match err {
                SharedError::ValidationError { .. } => StatusCode::BAD_REQUEST,
                SharedError::SerializationError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Message shown to the caller
    pub fn message(&self) -> String {
        match self {
            Self::Validation { message }
            | Self::Authentication { message }
            | Self::Authorization { message }
            | Self::NotFound { message } => message.clone(),
            Self::TransientStore { .. } => STORE_UNAVAILABLE.to_string(),
            Self::Conflict { .. } | Self::Store(_) => GENERIC_SERVER_ERROR.to_string(),
            Self::SharedError(SharedError::ValidationError { message, .. }) => message.clone(),
            Self::SharedError(SharedError::SerializationError { .. }) => {
                GENERIC_SERVER_ERROR.to_string()
            }
        }
    }

    /// Whether the caller may safely retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientStore { .. })
    }
}

impl From<StoreError> for BackendError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(message) => Self::Conflict { message },
            StoreError::Unavailable(message) => Self::TransientStore { message },
            other => Self::Store(other),
        }
    }
}
