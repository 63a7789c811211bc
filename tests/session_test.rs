//! Client session tests
//!
//! Two `SessionController`s talk to a real server over HTTP and the event
//! stream.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use common::*;
use space_point::client::{ClientError, SessionController, SessionUpdate, ViewChange};
use space_point::shared::config::AppConfig;
use space_point::shared::messaging::SendMessageRequest;

async fn session(base_url: &str, user_id: i64) -> SessionController {
    let config = AppConfig::builder()
        .server_url(base_url)
        .user_id(user_id)
        .reconnect_backoff(Duration::from_millis(20), Duration::from_millis(100))
        .build()
        .expect("client config");
    SessionController::connect(config)
        .await
        .expect("session connects")
}

async fn update(session: &mut SessionController) -> SessionUpdate {
    tokio::time::timeout(Duration::from_secs(2), session.next_update())
        .await
        .expect("timed out waiting for session update")
        .expect("relay task stopped")
        .expect("update applied")
}

#[tokio::test]
async fn test_two_users_exchange_messages() {
    let (router, state) = test_app(seeded_store().await, test_config());
    let base_url = spawn_server(router).await;
    let mut alice = session(&base_url, ALICE).await;
    let mut bob = session(&base_url, BOB).await;

    let chat_id = alice.open_private_chat(BOB).await.unwrap().chat_id();
    assert_eq!(bob.open_private_chat(ALICE).await.unwrap().chat_id(), chat_id);
    assert_eq!(state.relay.room_size(chat_id).await, 2);

    let sent = alice
        .send_message(SendMessageRequest::new("hello bob"))
        .await
        .unwrap();
    assert!(alice.view().unwrap().contains(sent.id));

    assert_eq!(
        update(&mut bob).await,
        SessionUpdate::View(ViewChange::MessageAdded(sent.id))
    );
    assert_eq!(bob.view().unwrap().last_message_id(), Some(sent.id));

    // The relay echo of Alice's own message is absorbed by the id merge
    assert_eq!(
        update(&mut alice).await,
        SessionUpdate::View(ViewChange::Duplicate(sent.id))
    );
    assert_eq!(alice.view().unwrap().messages().len(), 1);
}

#[tokio::test]
async fn test_read_receipt_reaches_sender() {
    let (router, _) = test_app(seeded_store().await, test_config());
    let base_url = spawn_server(router).await;
    let mut alice = session(&base_url, ALICE).await;
    let mut bob = session(&base_url, BOB).await;

    alice.open_private_chat(BOB).await.unwrap();
    bob.open_private_chat(ALICE).await.unwrap();

    let sent = alice
        .send_message(SendMessageRequest::new("did you see this?"))
        .await
        .unwrap();
    update(&mut alice).await;
    update(&mut bob).await;

    assert_eq!(bob.mark_read().await.unwrap(), Some(sent.id));
    assert_eq!(
        update(&mut alice).await,
        SessionUpdate::View(ViewChange::ReadUpTo {
            message_id: sent.id,
            updated: 1
        })
    );
    assert!(alice.view().unwrap().messages()[0].is_read_by_peer);

    // Alice has nothing from Bob to mark
    assert_eq!(alice.mark_read().await.unwrap(), None);
}

#[tokio::test]
async fn test_typing_indicator_and_server_timeout() {
    let (router, _) = test_app(seeded_store().await, test_config());
    let base_url = spawn_server(router).await;
    let mut alice = session(&base_url, ALICE).await;
    let mut bob = session(&base_url, BOB).await;

    alice.open_private_chat(BOB).await.unwrap();
    bob.open_private_chat(ALICE).await.unwrap();

    bob.set_typing(true).await.unwrap();
    assert_eq!(
        update(&mut alice).await,
        SessionUpdate::View(ViewChange::Typing {
            user_id: BOB,
            is_typing: true
        })
    );

    // No stop was sent; the relay clears it after the typing timeout
    assert_eq!(
        update(&mut alice).await,
        SessionUpdate::View(ViewChange::Typing {
            user_id: BOB,
            is_typing: false
        })
    );
}

#[tokio::test]
async fn test_close_chat_keeps_connection() {
    let (router, state) = test_app(seeded_store().await, test_config());
    let base_url = spawn_server(router).await;
    let mut alice = session(&base_url, ALICE).await;

    let chat_id = alice.open_private_chat(BOB).await.unwrap().chat_id();
    assert_eq!(state.relay.room_size(chat_id).await, 1);

    alice.close_chat().await.unwrap();
    assert!(alice.view().is_none());
    assert_eq!(state.relay.room_size(chat_id).await, 0);
    assert!(alice.relay().connection().await.is_some());
    assert_eq!(state.relay.connection_count().await, 1);

    assert_matches!(
        alice.send_message(SendMessageRequest::new("nobody home")).await,
        Err(ClientError::NoOpenChat)
    );
}

#[tokio::test]
async fn test_switching_chats_leaves_previous_room() {
    let (router, state) = test_app(seeded_store().await, test_config());
    let base_url = spawn_server(router).await;
    let mut alice = session(&base_url, ALICE).await;

    let with_bob = alice.open_private_chat(BOB).await.unwrap().chat_id();
    let with_carol = alice.open_private_chat(CAROL).await.unwrap().chat_id();
    assert_ne!(with_bob, with_carol);

    assert_eq!(state.relay.room_size(with_bob).await, 0);
    assert_eq!(state.relay.room_size(with_carol).await, 1);
    assert_eq!(alice.view().unwrap().chat_id(), with_carol);
}

#[tokio::test]
async fn test_failed_open_keeps_current_view() {
    let (router, state) = test_app(seeded_store().await, test_config());
    let base_url = spawn_server(router).await;
    let mut alice = session(&base_url, ALICE).await;

    let chat_id = alice.open_private_chat(BOB).await.unwrap().chat_id();

    let err = alice.open_chat(999).await.unwrap_err();
    assert_eq!(err.status(), Some(403));
    assert_eq!(alice.view().unwrap().chat_id(), chat_id);
    assert_eq!(state.relay.room_size(999).await, 0);
    assert_eq!(state.relay.room_size(chat_id).await, 1);

    assert_matches!(
        alice.open_private_chat(ALICE).await,
        Err(ClientError::Api { status: 400, .. })
    );
}

#[tokio::test]
async fn test_reconnect_rejoins_open_chat() {
    let (router, state) = test_app(seeded_store().await, test_config());
    let base_url = spawn_server(router).await;
    let mut alice = session(&base_url, ALICE).await;
    let mut bob = session(&base_url, BOB).await;

    let chat_id = alice.open_private_chat(BOB).await.unwrap().chat_id();
    let first = alice.relay().connection().await.unwrap();

    // Server drops the connection; the stream ends and the client reconnects
    state.relay.disconnect(first.connection_id).await;
    assert_eq!(update(&mut alice).await, SessionUpdate::Disconnected);
    assert_eq!(update(&mut alice).await, SessionUpdate::Resynced);

    let second = alice.relay().connection().await.unwrap();
    assert_ne!(first.connection_id, second.connection_id);
    assert_eq!(state.relay.room_size(chat_id).await, 1);

    bob.open_private_chat(ALICE).await.unwrap();
    let sent = bob
        .send_message(SendMessageRequest::new("still there?"))
        .await
        .unwrap();
    assert_eq!(
        update(&mut alice).await,
        SessionUpdate::View(ViewChange::MessageAdded(sent.id))
    );
}

#[tokio::test]
async fn test_unknown_user_cannot_connect() {
    let (router, _) = test_app(seeded_store().await, test_config());
    let base_url = spawn_server(router).await;
    let config = AppConfig::builder()
        .server_url(&base_url)
        .user_id(99)
        .reconnect_backoff(Duration::from_millis(20), Duration::from_millis(100))
        .build()
        .unwrap();

    // The relay keeps retrying, so connect gives up at its own timeout
    let attempt = tokio::time::timeout(Duration::from_millis(500), SessionController::connect(config)).await;
    assert!(attempt.is_err());
}
