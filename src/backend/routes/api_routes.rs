/**
 * API Route Handlers
 *
 * # Routes
 *
 * ## Public
 * - `GET /api/test` - Health check
 *
 * ## Chat (caller identity required)
 * - `GET /api/chat/chats` - Chats of the caller, most recent activity first
 * - `GET /api/chat/users` - User directory
 * - `GET /api/chat/private/{peer_id}` - Get or create a private chat
 * - `GET /api/chat/{chat_id}/messages?page&limit` - One page, chronological
 * - `POST /api/chat/{chat_id}/messages` - Send a message
 * - `POST /api/chat/{chat_id}/read` - Advance the caller's read position
 */

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::backend::chat::handlers::{
    health, list_chats, list_messages, list_users, mark_read, private_chat, send_message,
};
use crate::backend::middleware::auth_middleware;
use crate::backend::server::state::AppState;

/// Configure API routes
///
/// The chat routes sit behind `auth_middleware`; a request without a
/// resolvable caller never reaches a handler.
pub fn configure_api_routes(router: Router<AppState>, app_state: &AppState) -> Router<AppState> {
    let chat_api = Router::new()
        .route("/api/chat/chats", get(list_chats))
        .route("/api/chat/users", get(list_users))
        .route("/api/chat/private/{peer_id}", get(private_chat))
        .route(
            "/api/chat/{chat_id}/messages",
            get(list_messages).post(send_message),
        )
        .route("/api/chat/{chat_id}/read", post(mark_read))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth_middleware,
        ));

    router.route("/api/test", get(health)).merge(chat_api)
}
