/**
 * Server Initialization
 *
 * This module handles the initialization and setup of the Axum HTTP server,
 * including state creation, database loading, and route configuration.
 *
 * # Initialization Process
 *
 * 1. Load the optional database (falls back to the in-memory store)
 * 2. Create the relay with store-backed presence
 * 3. Create the chat service over the store and relay
 * 4. Choose the identity mode
 * 5. Create and configure the router
 */

use std::sync::Arc;

use axum::Router;

use crate::backend::auth::{IdentityResolver, TokenAuthority};
use crate::backend::chat::ChatService;
use crate::backend::realtime::{Relay, StorePresence};
use crate::backend::routes::router::create_router;
use crate::backend::server::config::{load_database, ServerConfig};
use crate::backend::server::state::AppState;
use crate::backend::store::{ChatStore, MemoryChatStore, PgChatStore};

/// Create and configure the Axum application
///
/// # Error Handling
///
/// The function is designed to be resilient:
/// - Missing database: server runs on the in-memory store
/// - Migration failures: logged but don't prevent startup
pub async fn create_app(config: ServerConfig) -> Router<()> {
    tracing::info!("Initializing Space-Point backend server");

    let store: Arc<dyn ChatStore> = match load_database(&config).await {
        Some(pool) => Arc::new(PgChatStore::new(pool)),
        None => Arc::new(MemoryChatStore::new()),
    };

    let app_state = build_state(config, store);
    let app = create_router(app_state);

    tracing::info!("Router configured");
    app
}

/// Assemble the application state over a given store
///
/// Tests call this directly with a seeded `MemoryChatStore`.
pub fn build_state(config: ServerConfig, store: Arc<dyn ChatStore>) -> AppState {
    let presence = Arc::new(StorePresence::new(store.clone()));
    let relay = Relay::new(config.typing_timeout(), presence);
    let chat = ChatService::new(store, relay.clone(), config.store_timeout());

    let identity = match &config.jwt_secret {
        Some(secret) => {
            tracing::info!("Token authentication enabled");
            IdentityResolver::with_tokens(TokenAuthority::new(secret))
        }
        None => {
            tracing::warn!(
                "JWT_SECRET not set. Trusting x-user-id / userId credentials; do not expose this server."
            );
            IdentityResolver::trusting()
        }
    };

    AppState {
        config: Arc::new(config),
        chat,
        relay,
        identity,
    }
}
