/**
 * Server-Sent Events Transport
 *
 * The stream transport of the relay, for clients that cannot or do not want
 * to hold a WebSocket.
 *
 * - `GET /realtime/stream?userId=..|token=..` opens the downstream. The first
 *   event is `connected {connectionId, userId}`.
 * - `POST /realtime/{connectionId}/events` carries one upstream client event
 *   (`chat:join`, `typing:start`, ...) as the request body.
 *
 * Each SSE event is named after the server event and its data is the full
 * `{"event": ..., "data": ...}` envelope, so both transports deliver the
 * same frames.
 *
 * # Example Response
 *
 * ```http
 * HTTP/1.1 200 OK
 * Content-Type: text/event-stream
 *
 * event: connected
 * data: {"event":"connected","data":{"connectionId":"...","userId":1}}
 *
 * event: message:new
 * data: {"event":"message:new","data":{"id":100,"chat_id":10,...}}
 * ```
 */

use std::convert::Infallible;

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::stream;
use serde::Deserialize;

use crate::backend::auth::{bearer_token, header_user_id};
use crate::backend::error::{BackendError, BackendResult};
use crate::backend::middleware::{resolve_caller, AuthUser, AuthenticatedUser};
use crate::backend::realtime::broadcast::{ConnectionId, Relay};
use crate::backend::realtime::session::handle_client_frame;
use crate::backend::server::state::AppState;
use crate::shared::event::{Connected, ServerEvent};

/// Connect-time credential of a relay connection
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeParams {
    pub user_id: Option<String>,
    pub token: Option<String>,
}

/// Authenticate a relay handshake from query parameters, falling back to
/// the request headers. A missing credential refuses the connection.
pub async fn authenticate_handshake(
    app_state: &AppState,
    headers: &HeaderMap,
    params: &HandshakeParams,
) -> BackendResult<AuthenticatedUser> {
    let token = params.token.as_deref().or_else(|| bearer_token(headers));
    let user_id = params.user_id.as_deref().or_else(|| header_user_id(headers));
    resolve_caller(app_state, token, user_id)
        .await
        .inspect_err(|e| tracing::warn!("[Relay] Handshake refused: {}", e))
}

/// Disconnects the relay connection when the stream is dropped
struct ConnectionGuard {
    relay: Relay,
    connection_id: ConnectionId,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let relay = self.relay.clone();
        let connection_id = self.connection_id;
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                relay.disconnect(connection_id).await;
            });
        }
    }
}

fn sse_event(event: &ServerEvent) -> Result<Event, axum::Error> {
    Event::default().event(event.name()).json_data(event)
}

/// Handle GET /realtime/stream
pub async fn handle_event_stream(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<HandshakeParams>, QueryRejection>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, BackendError> {
    let Query(params) = params?;
    let caller = authenticate_handshake(&app_state, &headers, &params).await?;

    let relay = app_state.relay.clone();
    let (connection_id, receiver) = relay.connect(caller.user_id).await;
    relay
        .send_to(
            connection_id,
            ServerEvent::Connected(Connected {
                connection_id,
                user_id: caller.user_id,
            }),
        )
        .await;

    tracing::info!(
        "[Relay] Event stream {} opened for user {}",
        connection_id,
        caller.user_id
    );

    let guard = ConnectionGuard {
        relay,
        connection_id,
    };
    let stream = stream::unfold((receiver, guard), |(mut rx, guard)| async move {
        loop {
            let event = rx.recv().await?;
            match sse_event(&event) {
                Ok(sse) => return Some((Ok(sse), (rx, guard))),
                Err(e) => {
                    tracing::error!("[Relay] Failed to serialize {}: {}", event.name(), e);
                    continue;
                }
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Handle POST /realtime/{connectionId}/events
///
/// The caller must own the connection. Malformed events are accepted and
/// ignored, matching the WebSocket transport.
pub async fn handle_upstream_event(
    State(relay): State<Relay>,
    AuthUser(caller): AuthUser,
    connection: Result<Path<ConnectionId>, PathRejection>,
    body: String,
) -> BackendResult<Json<serde_json::Value>> {
    let Path(connection_id) = connection?;
    match relay.connection_user(connection_id).await {
        None => Err(BackendError::not_found("Unknown relay connection")),
        Some(owner) if owner != caller.user_id => {
            tracing::warn!(
                "[Relay] User {} tried to drive connection {} of user {}",
                caller.user_id,
                connection_id,
                owner
            );
            Err(BackendError::authorization(
                "Relay connection belongs to another user",
            ))
        }
        Some(_) => {
            let handled = handle_client_frame(&relay, connection_id, &body).await;
            Ok(Json(serde_json::json!({
                "success": true,
                "handled": handled,
            })))
        }
    }
}
