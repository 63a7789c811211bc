/**
 * Message Handlers
 *
 * History, sending and read positions for one chat. The chat service
 * publishes `message:new` and `message:read` itself, so these handlers only
 * translate HTTP to service calls.
 *
 * # Example Request
 *
 * ```http
 * POST /api/chat/10/messages HTTP/1.1
 * Content-Type: application/json
 * x-user-id: 1
 *
 * {"text":"hi"}
 * ```
 */

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};

use crate::backend::chat::service::ChatService;
use crate::backend::error::BackendResult;
use crate::backend::middleware::AuthUser;
use crate::shared::messaging::{
    ListMessagesParams, ListMessagesResponse, MarkReadRequest, MarkReadResponse,
    SendMessageRequest, SendMessageResponse,
};

/// GET /api/chat/{chatId}/messages?page&limit
pub async fn list_messages(
    State(chat): State<ChatService>,
    AuthUser(caller): AuthUser,
    chat_id: Result<Path<i64>, PathRejection>,
    params: Result<Query<ListMessagesParams>, QueryRejection>,
) -> BackendResult<Json<ListMessagesResponse>> {
    let Path(chat_id) = chat_id?;
    let Query(params) = params?;
    let messages = chat.get_messages(caller.user_id, chat_id, params).await?;
    Ok(Json(ListMessagesResponse {
        success: true,
        messages,
    }))
}

/// POST /api/chat/{chatId}/messages
pub async fn send_message(
    State(chat): State<ChatService>,
    AuthUser(caller): AuthUser,
    chat_id: Result<Path<i64>, PathRejection>,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> BackendResult<Json<SendMessageResponse>> {
    let Path(chat_id) = chat_id?;
    let Json(request) = body?;
    let message = chat.send_message(caller.user_id, chat_id, request).await?;
    Ok(Json(SendMessageResponse {
        success: true,
        message,
    }))
}

/// POST /api/chat/{chatId}/read
pub async fn mark_read(
    State(chat): State<ChatService>,
    AuthUser(caller): AuthUser,
    chat_id: Result<Path<i64>, PathRejection>,
    body: Result<Json<MarkReadRequest>, JsonRejection>,
) -> BackendResult<Json<MarkReadResponse>> {
    let Path(chat_id) = chat_id?;
    // A missing body is the same as a missing messageId
    let request = body.map(|Json(request)| request).unwrap_or_default();
    chat.mark_read(caller.user_id, chat_id, request.message_id)
        .await?;
    Ok(Json(MarkReadResponse { success: true }))
}
