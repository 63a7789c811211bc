//! Chat REST Client
//!
//! Async functions for the chat API. Every request carries the configured
//! credential: a Bearer token, or the `x-user-id` header.

use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};

use crate::client::{ClientError, ClientResult};
use crate::shared::config::{AppConfig, Credential, USER_ID_HEADER};
use crate::shared::event::ClientEvent;
use crate::shared::messaging::{
    Chat, ChatListEntry, ChatMessage, ListChatsResponse, ListMessagesResponse, ListUsersResponse,
    MarkReadRequest, MarkReadResponse, PrivateChatResponse, SendMessageRequest,
    SendMessageResponse, User,
};
use uuid::Uuid;

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Chat API client
#[derive(Debug, Clone)]
pub struct ChatApi {
    config: AppConfig,
    client: Client,
}

impl ChatApi {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.credential {
            Credential::Token(token) => request.bearer_auth(token),
            Credential::UserId(user_id) => request.header(USER_ID_HEADER, user_id.to_string()),
        }
    }

    /// Decode a success body, or turn `{success: false, message}` into
    /// `ClientError::Api`
    async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ClientError::Decode(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or_else(|_| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            });
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Get the chats of the current user
    pub async fn list_chats(&self) -> ClientResult<Vec<ChatListEntry>> {
        let url = self.config.api_url("/api/chat/chats");
        let response = self.authorize(self.client.get(&url)).send().await?;
        let body: ListChatsResponse = Self::decode(response).await?;
        Ok(body.chats)
    }

    /// Get the user directory
    pub async fn list_users(&self) -> ClientResult<Vec<User>> {
        let url = self.config.api_url("/api/chat/users");
        let response = self.authorize(self.client.get(&url)).send().await?;
        let body: ListUsersResponse = Self::decode(response).await?;
        Ok(body.users)
    }

    /// Get or create the private chat with a peer
    pub async fn private_chat(&self, peer_id: i64) -> ClientResult<Chat> {
        let url = self.config.api_url(&format!("/api/chat/private/{}", peer_id));
        let response = self.authorize(self.client.get(&url)).send().await?;
        let body: PrivateChatResponse = Self::decode(response).await?;
        Ok(body.chat)
    }

    /// Get one page of messages, chronological
    pub async fn get_messages(&self, chat_id: i64, page: i64, limit: i64) -> ClientResult<Vec<ChatMessage>> {
        let url = self.config.api_url(&format!("/api/chat/{}/messages", chat_id));
        let response = self
            .authorize(self.client.get(&url))
            .query(&[("page", page), ("limit", limit)])
            .send()
            .await?;
        let body: ListMessagesResponse = Self::decode(response).await?;
        Ok(body.messages)
    }

    /// Send a message; returns the canonical stored message
    pub async fn send_message(&self, chat_id: i64, request: &SendMessageRequest) -> ClientResult<ChatMessage> {
        let url = self.config.api_url(&format!("/api/chat/{}/messages", chat_id));
        tracing::debug!("[Client] Sending message to chat {}", chat_id);
        let response = self
            .authorize(self.client.post(&url))
            .json(request)
            .send()
            .await?;
        let body: SendMessageResponse = Self::decode(response).await?;
        Ok(body.message)
    }

    /// Advance the read position of the current user
    pub async fn mark_read(&self, chat_id: i64, message_id: i64) -> ClientResult<()> {
        let url = self.config.api_url(&format!("/api/chat/{}/read", chat_id));
        let response = self
            .authorize(self.client.post(&url))
            .json(&MarkReadRequest {
                message_id: Some(message_id),
            })
            .send()
            .await?;
        let _: MarkReadResponse = Self::decode(response).await?;
        Ok(())
    }

    /// Open the relay event stream
    pub async fn open_stream(&self) -> ClientResult<Response> {
        let url = self.config.api_url("/realtime/stream");
        let response = self
            .authorize(self.client.get(&url))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::decode::<serde_json::Value>(response)
                .await
                .err()
                .unwrap_or(ClientError::NotConnected))
        }
    }

    /// Send one client event upstream on a stream connection
    pub async fn send_relay_event(&self, connection_id: Uuid, event: &ClientEvent) -> ClientResult<()> {
        let url = self
            .config
            .api_url(&format!("/realtime/{}/events", connection_id));
        let response = self
            .authorize(self.client.post(&url))
            .json(event)
            .send()
            .await?;
        let _: serde_json::Value = Self::decode(response).await?;
        Ok(())
    }
}
