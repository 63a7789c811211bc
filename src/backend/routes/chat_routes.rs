/**
 * Realtime Route Handlers
 *
 * # Routes
 *
 * - `GET /realtime/ws` - WebSocket relay connection
 * - `GET /realtime/stream` - Server-Sent Events relay connection
 * - `POST /realtime/{connection_id}/events` - Upstream client event for an
 *   SSE connection (caller identity required)
 *
 * The two GET routes authenticate their own handshake from the query string
 * or headers, since browsers cannot set headers on WebSocket or
 * EventSource requests.
 */

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::backend::middleware::auth_middleware;
use crate::backend::realtime::{handle_event_stream, handle_upstream_event, handle_websocket};
use crate::backend::server::state::AppState;

/// Configure realtime relay routes
pub fn configure_chat_routes(router: Router<AppState>, app_state: &AppState) -> Router<AppState> {
    let upstream = Router::new()
        .route(
            "/realtime/{connection_id}/events",
            post(handle_upstream_event),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth_middleware,
        ));

    router
        .route("/realtime/ws", get(handle_websocket))
        .route("/realtime/stream", get(handle_event_stream))
        .merge(upstream)
}
