/**
 * Authentication Middleware
 *
 * Resolves the caller of every protected route and attaches it to the
 * request extensions. Handlers receive it through the `AuthUser` extractor.
 *
 * Returns 401 when the credential is missing or invalid, or when the
 * claimed user does not exist.
 */

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::backend::auth::{bearer_token, header_user_id};
use crate::backend::error::{BackendError, BackendResult};
use crate::backend::server::state::AppState;
use crate::shared::messaging::UserProfile;

/// Caller resolved by the middleware
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub profile: UserProfile,
}

/// Resolve a caller from a token or a bare user id, then confirm the user
/// exists. Shared by the middleware and the relay handshake.
pub async fn resolve_caller(
    app_state: &AppState,
    token: Option<&str>,
    raw_user_id: Option<&str>,
) -> BackendResult<AuthenticatedUser> {
    let user_id = app_state.identity.claimed_user(token, raw_user_id)?;
    let profile = app_state.chat.authenticate(user_id).await?;
    Ok(AuthenticatedUser { user_id, profile })
}

/// Resolve a caller from request headers only
pub async fn resolve_from_headers(
    app_state: &AppState,
    headers: &HeaderMap,
) -> BackendResult<AuthenticatedUser> {
    resolve_caller(app_state, bearer_token(headers), header_user_id(headers)).await
}

/// Authentication middleware
pub async fn auth_middleware(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, BackendError> {
    let caller = resolve_from_headers(&app_state, request.headers())
        .await
        .inspect_err(|e| tracing::warn!("Rejected {} {}: {}", request.method(), request.uri().path(), e))?;

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

/// Axum extractor for the authenticated caller
#[derive(Clone, Debug)]
pub struct AuthUser(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = BackendError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| {
                tracing::warn!("AuthenticatedUser not found in request extensions");
                BackendError::authentication("Authentication required")
            })?;

        Ok(AuthUser(user))
    }
}
