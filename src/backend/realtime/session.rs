//! Inbound client events
//!
//! Both transports hand every upstream frame to [`handle_client_frame`].
//! Malformed frames are dropped without affecting the connection.

use crate::backend::realtime::broadcast::{ConnectionId, Relay};
use crate::shared::event::ClientEvent;

/// Apply one client event on behalf of a connection
pub async fn handle_client_event(relay: &Relay, connection_id: ConnectionId, event: ClientEvent) {
    match event {
        ClientEvent::Join(room) => {
            relay.join(connection_id, room.0).await;
        }
        ClientEvent::Leave(room) => {
            relay.leave(connection_id, room.0).await;
        }
        ClientEvent::TypingStart(chat) => {
            relay.typing(connection_id, chat.chat_id, true).await;
        }
        ClientEvent::TypingStop(chat) => {
            relay.typing(connection_id, chat.chat_id, false).await;
        }
        ClientEvent::MessageRead(echo) => {
            relay
                .read_echo(connection_id, echo.chat_id, echo.message_id)
                .await;
        }
    }
}

/// Parse and apply a raw frame. Returns false when the frame was ignored.
pub async fn handle_client_frame(relay: &Relay, connection_id: ConnectionId, raw: &str) -> bool {
    match ClientEvent::parse(raw) {
        Some(event) => {
            handle_client_event(relay, connection_id, event).await;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::event::ServerEvent;

    #[tokio::test]
    async fn test_frames_drive_room_membership() {
        let relay = Relay::without_presence();
        let (id, _rx) = relay.connect(1).await;

        assert!(handle_client_frame(&relay, id, r#"{"event":"chat:join","data":"7"}"#).await);
        assert_eq!(relay.room_size(7).await, 1);

        assert!(handle_client_frame(&relay, id, r#"{"event":"chat:leave","data":7}"#).await);
        assert_eq!(relay.room_size(7).await, 0);
    }

    #[tokio::test]
    async fn test_malformed_frames_are_ignored() {
        let relay = Relay::without_presence();
        let (id, _rx) = relay.connect(1).await;

        assert!(!handle_client_frame(&relay, id, "not json").await);
        assert!(!handle_client_frame(&relay, id, r#"{"event":"typing:start","data":{}}"#).await);
        assert!(!handle_client_frame(&relay, id, r#"{"event":"chat:explode","data":1}"#).await);
        assert_eq!(relay.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_typing_frame_reaches_peer() {
        let relay = Relay::without_presence();
        let (a, _rx_a) = relay.connect(1).await;
        let (b, mut rx_b) = relay.connect(2).await;
        handle_client_event(&relay, a, ClientEvent::join(3)).await;
        handle_client_event(&relay, b, ClientEvent::join(3)).await;

        handle_client_frame(&relay, a, r#"{"event":"typing:start","data":{"chatId":3}}"#).await;
        assert!(matches!(
            rx_b.try_recv(),
            Ok(ServerEvent::Typing(signal)) if signal.chat_id == 3 && signal.user_id == 1
        ));
    }
}
