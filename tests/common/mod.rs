//! Common test utilities and helpers
//!
//! - Seeded in-memory stores and app state
//! - A real server on a random port for client tests
//! - Postgres fixtures (see `database`)
//! - Custom assertion macros

#![allow(dead_code)]

pub mod assertions;
pub mod database;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_test::TestServer;
use space_point::backend::realtime::broadcast::EventReceiver;
use space_point::backend::routes::create_router;
use space_point::backend::server::{build_state, AppState, ServerConfig};
use space_point::backend::store::MemoryChatStore;
use space_point::shared::event::ServerEvent;

pub const ALICE: i64 = 1;
pub const BOB: i64 = 2;
pub const CAROL: i64 = 3;

/// Header name for trusted-mode requests
pub const X_USER_ID: &str = "x-user-id";

/// Store seeded with Alice (1), Bob (2) and Carol (3)
pub async fn seeded_store() -> MemoryChatStore {
    MemoryChatStore::with_users(&[("Alice", "alice"), ("Bob", "bob"), ("Carol", "carol")]).await
}

/// Trusted mode with short timeouts
pub fn test_config() -> ServerConfig {
    ServerConfig {
        store_timeout_ms: 1_000,
        typing_timeout_ms: 200,
        ..ServerConfig::default()
    }
}

/// Router and state over a given store
pub fn test_app(store: MemoryChatStore, config: ServerConfig) -> (Router, AppState) {
    let state = build_state(config, Arc::new(store));
    (create_router(state.clone()), state)
}

pub fn test_server(router: Router) -> TestServer {
    TestServer::new(router).expect("test server")
}

/// Serve the router on 127.0.0.1 with a random port; returns the base URL
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });
    format!("http://{}", addr)
}

/// Next event on a relay queue, failing after one second
pub async fn next_event(receiver: &mut EventReceiver) -> ServerEvent {
    tokio::time::timeout(Duration::from_secs(1), receiver.recv())
        .await
        .expect("timed out waiting for relay event")
        .expect("relay queue closed")
}

/// Assert nothing is queued right now
pub fn assert_no_event(receiver: &mut EventReceiver) {
    if let Ok(event) = receiver.try_recv() {
        panic!("expected no relay event, got {:?}", event);
    }
}
