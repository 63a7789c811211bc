//! Session Controller
//!
//! Drives one user session: a shared relay connection plus at most one open
//! chat view.
//!
//! # Opening a chat
//!
//! 1. Resolve the chat id (private peer, or a known chat)
//! 2. Join the room
//! 3. Fetch page 1 and install it as the view
//!
//! The room is joined before the fetch so nothing published in between is
//! lost; anything delivered twice is absorbed by the id-based merge.
//!
//! # Reconnect
//!
//! A new stream has a new connection id with no rooms. The open chat is
//! re-joined and page 1 is fetched again and merged into the view.

use std::time::{Duration, Instant};

use crate::client::api::ChatApi;
use crate::client::relay::{RelayClient, RelayNotice};
use crate::client::view::{ChatView, ViewChange};
use crate::client::{ClientError, ClientResult};
use crate::shared::config::AppConfig;
use crate::shared::event::ClientEvent;
use crate::shared::messaging::{ChatMessage, SendMessageRequest};
use tokio::sync::mpsc;

/// How long `connect` waits for the first stream
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of one processed relay notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Connected,
    /// Reconnected and the open chat, if any, was re-synced
    Resynced,
    Disconnected,
    View(ViewChange),
}

pub struct SessionController {
    api: ChatApi,
    relay: RelayClient,
    notices: mpsc::UnboundedReceiver<RelayNotice>,
    user_id: i64,
    view: Option<ChatView>,
}

impl SessionController {
    /// Open the relay connection and wait for the server to confirm it
    pub async fn connect(config: AppConfig) -> ClientResult<Self> {
        config.validate()?;
        let api = ChatApi::new(config);
        let (relay, mut notices) = RelayClient::spawn(api.clone());

        let hello = tokio::time::timeout(CONNECT_TIMEOUT, async {
            while let Some(notice) = notices.recv().await {
                if let RelayNotice::Connected(hello) | RelayNotice::Reconnected(hello) = notice {
                    return Some(hello);
                }
            }
            None
        })
        .await
        .ok()
        .flatten()
        .ok_or(ClientError::NotConnected)?;

        tracing::info!(
            "[Client] Session for user {} on connection {}",
            hello.user_id,
            hello.connection_id
        );

        Ok(Self {
            api,
            relay,
            notices,
            user_id: hello.user_id,
            view: None,
        })
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn api(&self) -> &ChatApi {
        &self.api
    }

    pub fn relay(&self) -> &RelayClient {
        &self.relay
    }

    pub fn view(&self) -> Option<&ChatView> {
        self.view.as_ref()
    }

    fn open_chat_id(&self) -> ClientResult<i64> {
        self.view
            .as_ref()
            .map(ChatView::chat_id)
            .ok_or(ClientError::NoOpenChat)
    }

    /// Open (or create) the private chat with a peer
    pub async fn open_private_chat(&mut self, peer_id: i64) -> ClientResult<&ChatView> {
        let chat = self.api.private_chat(peer_id).await?;
        self.open_chat(chat.id).await
    }

    /// Open a chat view, replacing the current one
    ///
    /// On failure the current view is left as it was.
    pub async fn open_chat(&mut self, chat_id: i64) -> ClientResult<&ChatView> {
        let previous = self.view.as_ref().map(ChatView::chat_id);
        let already_joined = previous == Some(chat_id);

        if !already_joined {
            self.relay.send(ClientEvent::join(chat_id)).await?;
        }

        let limit = self.api.config().page_limit;
        let messages = match self.api.get_messages(chat_id, 1, limit).await {
            Ok(messages) => messages,
            Err(e) => {
                if !already_joined {
                    if let Err(leave_err) = self.relay.send(ClientEvent::leave(chat_id)).await {
                        tracing::debug!("[Client] Leave after failed open: {}", leave_err);
                    }
                }
                return Err(e);
            }
        };

        if let Some(previous) = previous.filter(|id| *id != chat_id) {
            if let Err(e) = self.relay.send(ClientEvent::leave(previous)).await {
                tracing::debug!("[Client] Leave of chat {} failed: {}", previous, e);
            }
        }

        let view = ChatView::with_snapshot(chat_id, self.user_id, messages);
        Ok(self.view.insert(view))
    }

    /// Close the open view; the relay connection stays up
    pub async fn close_chat(&mut self) -> ClientResult<()> {
        let Some(view) = self.view.take() else {
            return Ok(());
        };
        self.relay.send(ClientEvent::leave(view.chat_id())).await
    }

    /// Send a message to the open chat and merge the stored copy
    ///
    /// On error nothing changes locally; the caller keeps the draft.
    pub async fn send_message(&mut self, request: SendMessageRequest) -> ClientResult<ChatMessage> {
        let chat_id = self.open_chat_id()?;
        let message = self.api.send_message(chat_id, &request).await?;

        match self.view.as_mut() {
            Some(view) if view.chat_id() == chat_id => {
                view.merge_message(message.clone());
            }
            _ => tracing::debug!("[Client] Chat {} closed before send returned", chat_id),
        }
        Ok(message)
    }

    /// Mark everything the peer wrote in the open view as read
    ///
    /// Returns the message id the read position advanced to, or `None`
    /// when there is nothing from the peer.
    pub async fn mark_read(&mut self) -> ClientResult<Option<i64>> {
        let view = self.view.as_ref().ok_or(ClientError::NoOpenChat)?;
        let Some(message_id) = view.latest_peer_message_id() else {
            return Ok(None);
        };
        self.api.mark_read(view.chat_id(), message_id).await?;
        Ok(Some(message_id))
    }

    /// Tell the room whether the user is typing
    pub async fn set_typing(&self, is_typing: bool) -> ClientResult<()> {
        let chat_id = self.open_chat_id()?;
        self.relay.send(ClientEvent::typing(chat_id, is_typing)).await
    }

    /// Wait for the next relay notice and apply it
    ///
    /// Returns `None` when the relay task has stopped.
    pub async fn next_update(&mut self) -> Option<ClientResult<SessionUpdate>> {
        let notice = self.notices.recv().await?;
        Some(self.handle_notice(notice).await)
    }

    async fn handle_notice(&mut self, notice: RelayNotice) -> ClientResult<SessionUpdate> {
        match notice {
            RelayNotice::Connected(_) => Ok(SessionUpdate::Connected),
            RelayNotice::Disconnected => {
                tracing::warn!("[Client] Relay disconnected");
                Ok(SessionUpdate::Disconnected)
            }
            RelayNotice::Reconnected(_) => {
                self.resync().await?;
                Ok(SessionUpdate::Resynced)
            }
            RelayNotice::Event(event) => {
                let change = match self.view.as_mut() {
                    Some(view) => view.apply(&event, Instant::now()),
                    None => ViewChange::Ignored,
                };
                Ok(SessionUpdate::View(change))
            }
        }
    }

    async fn resync(&mut self) -> ClientResult<()> {
        let Some(chat_id) = self.view.as_ref().map(ChatView::chat_id) else {
            return Ok(());
        };

        self.relay.send(ClientEvent::join(chat_id)).await?;
        let limit = self.api.config().page_limit;
        let messages = self.api.get_messages(chat_id, 1, limit).await?;

        if let Some(view) = self.view.as_mut().filter(|v| v.chat_id() == chat_id) {
            view.merge_snapshot(messages);
        }
        tracing::info!("[Client] Re-synced chat {}", chat_id);
        Ok(())
    }

    pub fn shutdown(&self) {
        self.relay.shutdown();
    }
}
