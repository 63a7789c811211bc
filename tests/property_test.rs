//! Property-based tests
//!
//! Uses proptest to check the ordering and monotonicity guarantees of the
//! store and the client view under random inputs.

mod common;

use chrono::Utc;
use proptest::prelude::*;

use common::*;
use space_point::backend::store::ChatStore;
use space_point::client::{ChatView, SseDecoder};
use space_point::shared::event::ClientEvent;
use space_point::shared::messaging::{ChatMessage, PrivatePair, UserProfile};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn message(id: i64, chat_id: i64, user_id: i64) -> ChatMessage {
    ChatMessage {
        id,
        chat_id,
        user_id,
        text: format!("m{}", id),
        created_at: Utc::now(),
        is_edited: false,
        is_deleted: false,
        reply_to_id: None,
        is_read_by_peer: false,
        user: UserProfile {
            id: user_id,
            name: format!("User {}", user_id),
            username: format!("user{}", user_id),
            user_avatar: None,
        },
    }
}

proptest! {
    #[test]
    fn test_read_position_never_regresses(marks in prop::collection::vec(1i64..500, 1..40)) {
        let rt = runtime();
        let (positions, stored) = rt.block_on(async {
            let store = seeded_store().await;
            let pair = PrivatePair::new(ALICE, BOB).unwrap();
            let chat = store.create_private_chat(ALICE, pair).await.unwrap().into_chat();

            let mut positions = Vec::new();
            for mark in &marks {
                let position = store.advance_read_position(chat.id, BOB, *mark).await.unwrap();
                positions.push(position.message_id);
            }
            let stored = store.read_position(chat.id, BOB).await.unwrap();
            (positions, stored)
        });

        prop_assert!(positions.windows(2).all(|w| w[0] <= w[1]));
        let max = marks.iter().copied().max();
        prop_assert_eq!(positions.last().copied(), max);
        prop_assert_eq!(stored, max);
    }

    #[test]
    fn test_view_stays_sorted_and_unique(
        ids in prop::collection::vec(1i64..200, 0..80),
        snapshot in prop::collection::vec(1i64..200, 0..30),
    ) {
        let mut view = ChatView::new(10, ALICE);
        for id in &ids {
            view.merge_message(message(*id, 10, if id % 2 == 0 { ALICE } else { BOB }));
        }
        view.merge_snapshot(snapshot.iter().map(|id| message(*id, 10, BOB)).collect());

        let held: Vec<i64> = view.messages().iter().map(|m| m.id).collect();
        prop_assert!(held.windows(2).all(|w| w[0] < w[1]));

        let mut expected: Vec<i64> = ids.iter().chain(snapshot.iter()).copied().collect();
        expected.sort_unstable();
        expected.dedup();
        prop_assert_eq!(held, expected);
    }

    #[test]
    fn test_view_ignores_foreign_chats(ids in prop::collection::vec((1i64..100, 1i64..4), 0..50)) {
        let mut view = ChatView::new(2, ALICE);
        for (id, chat_id) in &ids {
            view.merge_message(message(*id, *chat_id, BOB));
        }
        prop_assert!(view.messages().iter().all(|m| m.chat_id == 2));
    }

    #[test]
    fn test_read_flags_never_touch_peer_messages(
        authors in prop::collection::vec(any::<bool>(), 1..40),
        read_up_to in 0i64..50,
    ) {
        let messages: Vec<ChatMessage> = authors
            .iter()
            .enumerate()
            .map(|(i, mine)| message(i as i64 + 1, 10, if *mine { ALICE } else { BOB }))
            .collect();
        let mut view = ChatView::with_snapshot(10, ALICE, messages);
        view.apply_read(read_up_to);

        for m in view.messages() {
            let expected = m.user_id == ALICE && m.id <= read_up_to;
            prop_assert_eq!(m.is_read_by_peer, expected);
        }
    }

    #[test]
    fn test_private_pair_is_symmetric(a in 1i64..1000, b in 1i64..1000) {
        prop_assert_eq!(PrivatePair::new(a, b), PrivatePair::new(b, a));
        prop_assert_eq!(PrivatePair::new(a, b).is_none(), a == b);
        if let Some(pair) = PrivatePair::new(a, b) {
            prop_assert!(pair.low < pair.high);
        }
    }

    #[test]
    fn test_client_event_parse_never_panics(raw in ".*") {
        let _ = ClientEvent::parse(&raw);
    }

    #[test]
    fn test_sse_decoder_is_chunking_independent(
        payloads in prop::collection::vec("[a-z0-9{}\":,]{1,20}", 1..10),
        cut in 1usize..16,
    ) {
        let wire: String = payloads
            .iter()
            .map(|p| format!("event: x\ndata: {}\n\n", p))
            .collect();

        let mut decoder = SseDecoder::default();
        let mut decoded = Vec::new();
        for chunk in wire.as_bytes().chunks(cut) {
            decoded.extend(decoder.push(chunk));
        }
        prop_assert_eq!(decoded, payloads);
    }
}
