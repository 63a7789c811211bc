/**
 * Application State Management
 *
 * This module defines the application state structure and implements
 * the necessary `FromRef` traits for Axum state extraction.
 *
 * # Architecture
 *
 * The `AppState` struct serves as the central state container for the
 * application, holding:
 * - Server configuration
 * - The chat service (store access + publishing)
 * - The realtime relay
 * - The identity resolver used by the auth middleware and relay handshake
 *
 * Every field is a cheap handle over shared state, so cloning `AppState`
 * per request is fine.
 *
 * # Example
 *
 * ```rust,ignore
 * use space_point::backend::chat::ChatService;
 * use axum::extract::State;
 *
 * async fn handler(State(chat): State<ChatService>) {
 *     // ...
 * }
 * ```
 */

use std::sync::Arc;

use axum::extract::FromRef;

use crate::backend::auth::IdentityResolver;
use crate::backend::chat::ChatService;
use crate::backend::realtime::Relay;
use crate::backend::server::config::ServerConfig;

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,

    /// Chat service; owns the store handle and a clone of the relay
    pub chat: ChatService,

    /// Realtime relay shared by both transports
    pub relay: Relay,

    pub identity: IdentityResolver,
}

/// Implement FromRef for ChatService
///
/// This allows Axum handlers to extract the chat service directly from
/// `AppState` using `State(ChatService)`.
impl FromRef<AppState> for ChatService {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.chat.clone()
    }
}

/// Implement FromRef for Relay
impl FromRef<AppState> for Relay {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.relay.clone()
    }
}

impl FromRef<AppState> for Arc<ServerConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.config.clone()
    }
}
