//! Caller Identity
//!
//! The identity service is external; this module only turns the credential
//! a request carries into a claimed user id.
//!
//! Two modes:
//!
//! - **Token mode** (`JWT_SECRET` configured): a Bearer token (header or
//!   `token` query parameter) is required and verified.
//! - **Trusted mode** (no secret): the `x-user-id` header or `userId` query
//!   parameter is taken at face value. Meant for local development only.
//!
//! In both modes the caller must also exist in the store; that check lives
//! in the chat service.

use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::backend::error::{BackendError, BackendResult};

/// JWT issuing and verification
pub mod sessions;

pub use sessions::{Claims, TokenAuthority};

pub use crate::shared::config::USER_ID_HEADER;

/// Bearer token from the `Authorization` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Bare user id from the `x-user-id` header
pub fn header_user_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Resolves request credentials into a claimed user id
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    tokens: Option<TokenAuthority>,
}

impl IdentityResolver {
    /// Token mode
    pub fn with_tokens(tokens: TokenAuthority) -> Self {
        Self {
            tokens: Some(tokens),
        }
    }

    /// Trusted mode
    pub fn trusting() -> Self {
        Self { tokens: None }
    }

    pub fn requires_token(&self) -> bool {
        self.tokens.is_some()
    }

    /// Claimed user id for a credential pair
    pub fn claimed_user(&self, token: Option<&str>, raw_user_id: Option<&str>) -> BackendResult<i64> {
        match &self.tokens {
            Some(authority) => {
                let token = token.ok_or_else(|| BackendError::authentication("Authentication required"))?;
                let claims = authority.verify(token).map_err(|e| {
                    tracing::debug!("Rejected token: {}", e);
                    BackendError::authentication("Invalid or expired token")
                })?;
                claims
                    .user_id()
                    .ok_or_else(|| BackendError::authentication("Invalid or expired token"))
            }
            None => {
                let raw = raw_user_id.ok_or_else(|| BackendError::authentication("Authentication required"))?;
                raw.parse::<i64>()
                    .ok()
                    .filter(|id| *id > 0)
                    .ok_or_else(|| BackendError::authentication("Invalid user id"))
            }
        }
    }
}
