/**
 * Chat list, user directory and private chat handlers
 */

use axum::{
    extract::{rejection::PathRejection, Path, State},
    Json,
};
use chrono::Utc;

use crate::backend::chat::service::ChatService;
use crate::backend::error::BackendResult;
use crate::backend::middleware::AuthUser;
use crate::shared::messaging::{ListChatsResponse, ListUsersResponse, PrivateChatResponse};

/// GET /api/chat/chats
pub async fn list_chats(
    State(chat): State<ChatService>,
    AuthUser(caller): AuthUser,
) -> BackendResult<Json<ListChatsResponse>> {
    let chats = chat.list_chats(caller.user_id).await?;
    Ok(Json(ListChatsResponse {
        success: true,
        chats,
    }))
}

/// GET /api/chat/users
pub async fn list_users(
    State(chat): State<ChatService>,
    AuthUser(caller): AuthUser,
) -> BackendResult<Json<ListUsersResponse>> {
    let users = chat.list_users(caller.user_id).await?;
    Ok(Json(ListUsersResponse {
        success: true,
        users,
    }))
}

/// GET /api/chat/private/{peerId}
///
/// Returns the existing private chat with the peer or creates it.
pub async fn private_chat(
    State(chat): State<ChatService>,
    AuthUser(caller): AuthUser,
    peer: Result<Path<i64>, PathRejection>,
) -> BackendResult<Json<PrivateChatResponse>> {
    let Path(peer_id) = peer?;
    let chat = chat
        .get_or_create_private_chat(caller.user_id, peer_id)
        .await?;
    Ok(Json(PrivateChatResponse {
        success: true,
        chat,
    }))
}

/// GET /api/test
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "message": "Server is running",
        "timestamp": Utc::now(),
    }))
}
