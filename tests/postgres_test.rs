//! Postgres store tests
//!
//! Require a running Postgres at `DATABASE_URL`; run with
//! `cargo test -- --ignored`.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serial_test::serial;

use common::database::{insert_user, TestDatabase};
use space_point::backend::chat::{ChatService, DEFAULT_STORE_TIMEOUT};
use space_point::backend::realtime::Relay;
use space_point::backend::store::{ChatStore, PgChatStore, PrivateChatOutcome};
use space_point::shared::messaging::{ListMessagesParams, PrivatePair, SendMessageRequest};

struct Fixture {
    _db: TestDatabase,
    store: PgChatStore,
    alice: i64,
    bob: i64,
    carol: i64,
}

async fn fixture() -> Fixture {
    let db = TestDatabase::new().await;
    let alice = insert_user(db.pool(), "Alice", "alice").await;
    let bob = insert_user(db.pool(), "Bob", "bob").await;
    let carol = insert_user(db.pool(), "Carol", "carol").await;
    let store = PgChatStore::new(db.pool().clone());
    Fixture {
        _db: db,
        store,
        alice,
        bob,
        carol,
    }
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_private_chat_created_once() {
    let f = fixture().await;
    let pair = PrivatePair::new(f.alice, f.bob).unwrap();

    let first = f.store.create_private_chat(f.alice, pair).await.unwrap();
    assert!(first.was_created());
    let second = f.store.create_private_chat(f.bob, pair).await.unwrap();
    assert!(matches!(second, PrivateChatOutcome::AlreadyExisted(_)));
    assert_eq!(first.into_chat().id, second.into_chat().id);

    let found = f.store.find_private_chat(pair).await.unwrap().unwrap();
    assert!(f.store.is_active_member(found.id, f.alice).await.unwrap());
    assert!(f.store.is_active_member(found.id, f.bob).await.unwrap());
    assert!(!f.store.is_active_member(found.id, f.carol).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
#[serial]
async fn test_concurrent_private_chat_creation_converges() {
    let f = fixture().await;
    let store = Arc::new(f.store.clone());
    let service = ChatService::new(store.clone(), Relay::without_presence(), DEFAULT_STORE_TIMEOUT);

    let mut tasks = Vec::new();
    for i in 0..8 {
        let service = service.clone();
        let (me, peer) = if i % 2 == 0 { (f.alice, f.bob) } else { (f.bob, f.alice) };
        tasks.push(tokio::spawn(async move {
            service.get_or_create_private_chat(me, peer).await
        }));
    }

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap().unwrap().id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chats WHERE type = 'private'")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_messages_and_read_flags() {
    let f = fixture().await;
    let pair = PrivatePair::new(f.alice, f.bob).unwrap();
    let chat = f
        .store
        .create_private_chat(f.alice, pair)
        .await
        .unwrap()
        .into_chat();

    let m1 = f.store.insert_message(chat.id, f.alice, "one", None).await.unwrap();
    let m2 = f
        .store
        .insert_message(chat.id, f.bob, "two", Some(m1.id))
        .await
        .unwrap();
    let m3 = f.store.insert_message(chat.id, f.alice, "three", None).await.unwrap();
    assert!(m1.id < m2.id && m2.id < m3.id);
    assert_eq!(m2.reply_to_id, Some(m1.id));
    assert_eq!(m2.user.username, "bob");
    assert_eq!(f.store.message_chat_id(m2.id).await.unwrap(), Some(chat.id));

    let position = f
        .store
        .advance_read_position(chat.id, f.bob, m1.id)
        .await
        .unwrap();
    assert_eq!(position.message_id, m1.id);

    let for_alice = f.store.list_messages(chat.id, f.alice, 50, 0).await.unwrap();
    let flags: Vec<(i64, bool)> = for_alice.iter().map(|m| (m.id, m.is_read_by_peer)).collect();
    assert_eq!(flags, vec![(m1.id, true), (m2.id, false), (m3.id, false)]);

    // Lower ids never move the position back
    f.store
        .advance_read_position(chat.id, f.bob, m3.id)
        .await
        .unwrap();
    let position = f
        .store
        .advance_read_position(chat.id, f.bob, m1.id)
        .await
        .unwrap();
    assert_eq!(position.message_id, m3.id);
    assert_eq!(f.store.read_position(chat.id, f.bob).await.unwrap(), Some(m3.id));

    let newest = f.store.list_messages(chat.id, f.bob, 2, 0).await.unwrap();
    let ids: Vec<i64> = newest.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![m2.id, m3.id]);

    let chats = f.store.list_chats(f.alice).await.unwrap();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].last_message.as_deref(), Some("three"));
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_service_over_postgres() {
    let f = fixture().await;
    let service = ChatService::new(
        Arc::new(f.store.clone()),
        Relay::without_presence(),
        DEFAULT_STORE_TIMEOUT,
    );

    let chat = service.get_or_create_private_chat(f.alice, f.bob).await.unwrap();
    let sent = service
        .send_message(f.alice, chat.id, SendMessageRequest::new("  hi  "))
        .await
        .unwrap();
    assert_eq!(sent.text, "hi");

    let page = service
        .get_messages(f.bob, chat.id, ListMessagesParams::default())
        .await
        .unwrap();
    assert_eq!(page.len(), 1);

    assert!(service
        .get_messages(f.carol, chat.id, ListMessagesParams::default())
        .await
        .is_err());

    let users = service.list_users(f.alice).await.unwrap();
    let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
    assert_eq!(ids, vec![f.bob, f.carol]);
}
