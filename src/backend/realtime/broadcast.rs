/**
 * Room Registry and Fan-out
 *
 * The relay keeps one room per chat. Each connection owns an unbounded queue
 * of `ServerEvent`s that its transport (WebSocket or SSE) drains.
 *
 * # Registry
 *
 * - `connections`: connection id -> user, queue, joined rooms, typing rooms
 * - `rooms`: chat id -> set of connection ids
 *
 * Both maps sit behind one `tokio::sync::RwLock`. A publish snapshots the
 * recipient queues under the read lock and sends after releasing it, so a
 * slow consumer never blocks joins or leaves.
 *
 * # Delivery
 *
 * Within one room, events are delivered in publish call order. A queue whose
 * receiver is gone is pruned on the next publish that reaches it.
 *
 * # Presence
 *
 * Presence transitions run one at a time and report the user's state as the
 * registry holds it at that moment, so a last-tab disconnect racing a new
 * connection never leaves a connected user marked offline.
 */

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use uuid::Uuid;

use crate::backend::realtime::presence::{NoPresence, Presence};
use crate::shared::event::{ReadReceipt, ServerEvent, TypingSignal};

/// Identifier of one relay connection
pub type ConnectionId = Uuid;

/// Outbound queue of a connection
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Receiving half handed to the transport
pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

/// Default silence after which a typing indicator is cleared
pub const DEFAULT_TYPING_TIMEOUT: Duration = Duration::from_secs(5);

/// Who in a room receives a publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Every connection in the room
    Room,
    /// Every connection except the one that triggered the event
    ExceptConnection(ConnectionId),
    /// Every connection not owned by the given user
    ExceptUser(i64),
}

impl Audience {
    fn includes(&self, connection_id: ConnectionId, user_id: i64) -> bool {
        match self {
            Audience::Room => true,
            Audience::ExceptConnection(id) => *id != connection_id,
            Audience::ExceptUser(id) => *id != user_id,
        }
    }
}

struct ConnectionHandle {
    user_id: i64,
    sender: EventSender,
    rooms: HashSet<i64>,
    /// Rooms this connection is typing in, with the epoch of the last start
    typing: HashMap<i64, u64>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, ConnectionHandle>,
    rooms: HashMap<i64, HashSet<ConnectionId>>,
    typing_epoch: u64,
}

impl Registry {
    fn remove_from_room(&mut self, chat_id: i64, connection_id: ConnectionId) {
        if let Some(members) = self.rooms.get_mut(&chat_id) {
            members.remove(&connection_id);
            if members.is_empty() {
                self.rooms.remove(&chat_id);
            }
        }
    }

    fn user_is_connected(&self, user_id: i64) -> bool {
        self.connections.values().any(|c| c.user_id == user_id)
    }
}

struct RelayInner {
    registry: RwLock<Registry>,
    typing_timeout: Duration,
    presence: Arc<dyn Presence>,
    presence_gate: Mutex<()>,
}

/// Room-based publish/subscribe hub
///
/// Cheap to clone; all clones share one registry.
#[derive(Clone)]
pub struct Relay {
    inner: Arc<RelayInner>,
}

impl Relay {
    pub fn new(typing_timeout: Duration, presence: Arc<dyn Presence>) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                registry: RwLock::new(Registry::default()),
                typing_timeout,
                presence,
                presence_gate: Mutex::new(()),
            }),
        }
    }

    /// Relay with the default typing timeout and no presence reporting
    pub fn without_presence() -> Self {
        Self::new(DEFAULT_TYPING_TIMEOUT, Arc::new(NoPresence))
    }

    /// Register an authenticated connection
    pub async fn connect(&self, user_id: i64) -> (ConnectionId, EventReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let connection_id = Uuid::new_v4();

        let first_for_user = {
            let mut registry = self.inner.registry.write().await;
            let first = !registry.user_is_connected(user_id);
            registry.connections.insert(
                connection_id,
                ConnectionHandle {
                    user_id,
                    sender,
                    rooms: HashSet::new(),
                    typing: HashMap::new(),
                },
            );
            first
        };

        tracing::info!(
            "[Relay] Connection {} opened for user {}",
            connection_id,
            user_id
        );
        if first_for_user {
            self.settle_presence(user_id).await;
        }
        (connection_id, receiver)
    }

    /// Remove a connection from every room. Returns false if it was unknown.
    pub async fn disconnect(&self, connection_id: ConnectionId) -> bool {
        let (handle, last_for_user) = {
            let mut registry = self.inner.registry.write().await;
            let Some(handle) = registry.connections.remove(&connection_id) else {
                return false;
            };
            for chat_id in &handle.rooms {
                registry.remove_from_room(*chat_id, connection_id);
            }
            let last = !registry.user_is_connected(handle.user_id);
            (handle, last)
        };

        for chat_id in handle.typing.keys() {
            let signal = TypingSignal {
                chat_id: *chat_id,
                user_id: handle.user_id,
                is_typing: false,
            };
            self.fan_out(*chat_id, ServerEvent::Typing(signal), Audience::Room)
                .await;
        }

        tracing::info!(
            "[Relay] Connection {} closed for user {} ({} rooms)",
            connection_id,
            handle.user_id,
            handle.rooms.len()
        );
        if last_for_user {
            self.settle_presence(handle.user_id).await;
        }
        true
    }

    async fn settle_presence(&self, user_id: i64) {
        let _gate = self.inner.presence_gate.lock().await;
        let online = self.inner.registry.read().await.user_is_connected(user_id);
        if online {
            self.inner.presence.connected(user_id).await;
        } else {
            self.inner.presence.disconnected(user_id).await;
        }
    }

    /// Add a connection to `room(chat_id)`. Idempotent; returns true only
    /// when the connection was not yet in the room.
    pub async fn join(&self, connection_id: ConnectionId, chat_id: i64) -> bool {
        let mut guard = self.inner.registry.write().await;
        let registry = &mut *guard;
        let Some(handle) = registry.connections.get_mut(&connection_id) else {
            tracing::debug!("[Relay] Join from unknown connection {}", connection_id);
            return false;
        };
        let joined = handle.rooms.insert(chat_id);
        registry.rooms.entry(chat_id).or_default().insert(connection_id);
        if joined {
            tracing::debug!(
                "[Relay] Connection {} joined chat {}",
                connection_id,
                chat_id
            );
        }
        joined
    }

    /// Remove a connection from `room(chat_id)`. Safe on rooms not joined.
    pub async fn leave(&self, connection_id: ConnectionId, chat_id: i64) -> bool {
        let (left, typing_user) = {
            let mut registry = self.inner.registry.write().await;
            let Some(handle) = registry.connections.get_mut(&connection_id) else {
                return false;
            };
            let left = handle.rooms.remove(&chat_id);
            let typing_user = handle
                .typing
                .remove(&chat_id)
                .map(|_| handle.user_id);
            if left {
                registry.remove_from_room(chat_id, connection_id);
            }
            (left, typing_user)
        };

        if let Some(user_id) = typing_user {
            let signal = TypingSignal {
                chat_id,
                user_id,
                is_typing: false,
            };
            self.publish(chat_id, ServerEvent::Typing(signal)).await;
        }
        if left {
            tracing::debug!("[Relay] Connection {} left chat {}", connection_id, chat_id);
        }
        left
    }

    /// Deliver an event to every connection in the room
    pub async fn publish(&self, chat_id: i64, event: ServerEvent) -> usize {
        self.publish_to(chat_id, event, Audience::Room).await
    }

    /// Deliver an event to part of a room. Returns the number of queues
    /// that accepted it.
    pub async fn publish_to(&self, chat_id: i64, event: ServerEvent, audience: Audience) -> usize {
        let name = event.name();
        let (delivered, closed) = self.fan_out(chat_id, event, audience).await;
        for connection_id in closed {
            tracing::debug!("[Relay] Pruning closed connection {}", connection_id);
            self.disconnect(connection_id).await;
        }
        tracing::debug!(
            "[Relay] {} published to chat {} ({} recipients)",
            name,
            chat_id,
            delivered
        );
        delivered
    }

    /// Send to the room snapshot without pruning
    async fn fan_out(
        &self,
        chat_id: i64,
        event: ServerEvent,
        audience: Audience,
    ) -> (usize, Vec<ConnectionId>) {
        let recipients: Vec<(ConnectionId, EventSender)> = {
            let registry = self.inner.registry.read().await;
            match registry.rooms.get(&chat_id) {
                Some(members) => members
                    .iter()
                    .filter_map(|id| registry.connections.get(id).map(|handle| (*id, handle)))
                    .filter(|(id, handle)| audience.includes(*id, handle.user_id))
                    .map(|(id, handle)| (id, handle.sender.clone()))
                    .collect(),
                None => Vec::new(),
            }
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (connection_id, sender) in recipients {
            if sender.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                closed.push(connection_id);
            }
        }
        (delivered, closed)
    }

    /// Relay a typing signal from a connection to the rest of the room.
    ///
    /// A start arms a timer; if no further start or stop arrives within the
    /// typing timeout, `isTyping: false` is published on the user's behalf.
    pub async fn typing(&self, connection_id: ConnectionId, chat_id: i64, is_typing: bool) -> bool {
        let (user_id, epoch) = {
            let mut registry = self.inner.registry.write().await;
            registry.typing_epoch += 1;
            let epoch = registry.typing_epoch;
            let Some(handle) = registry.connections.get_mut(&connection_id) else {
                return false;
            };
            if !handle.rooms.contains(&chat_id) {
                tracing::debug!(
                    "[Relay] Ignoring typing from connection {} outside chat {}",
                    connection_id,
                    chat_id
                );
                return false;
            }
            if is_typing {
                handle.typing.insert(chat_id, epoch);
            } else {
                handle.typing.remove(&chat_id);
            }
            (handle.user_id, epoch)
        };

        let signal = TypingSignal {
            chat_id,
            user_id,
            is_typing,
        };
        self.publish_to(
            chat_id,
            ServerEvent::Typing(signal),
            Audience::ExceptConnection(connection_id),
        )
        .await;

        if is_typing {
            self.schedule_typing_expiry(connection_id, chat_id, epoch);
        }
        true
    }

    fn schedule_typing_expiry(&self, connection_id: ConnectionId, chat_id: i64, epoch: u64) {
        let relay = self.clone();
        let timeout = self.inner.typing_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            relay.expire_typing(connection_id, chat_id, epoch).await;
        });
    }

    async fn expire_typing(&self, connection_id: ConnectionId, chat_id: i64, epoch: u64) {
        let user_id = {
            let mut registry = self.inner.registry.write().await;
            let Some(handle) = registry.connections.get_mut(&connection_id) else {
                return;
            };
            if handle.typing.get(&chat_id) != Some(&epoch) {
                return;
            }
            handle.typing.remove(&chat_id);
            handle.user_id
        };

        tracing::debug!(
            "[Relay] Typing timed out for user {} in chat {}",
            user_id,
            chat_id
        );
        let signal = TypingSignal {
            chat_id,
            user_id,
            is_typing: false,
        };
        self.publish_to(
            chat_id,
            ServerEvent::Typing(signal),
            Audience::ExceptConnection(connection_id),
        )
        .await;
    }

    /// Relay a client-side read echo to the rest of the room. Nothing is
    /// persisted; the authoritative receipt comes from the chat service.
    pub async fn read_echo(&self, connection_id: ConnectionId, chat_id: i64, message_id: i64) -> bool {
        let reader_id = {
            let registry = self.inner.registry.read().await;
            match registry.connections.get(&connection_id) {
                Some(handle) if handle.rooms.contains(&chat_id) => handle.user_id,
                _ => return false,
            }
        };

        let receipt = ReadReceipt {
            chat_id,
            message_id,
            reader_id,
            read_at: Utc::now(),
        };
        self.publish_to(
            chat_id,
            ServerEvent::MessageRead(receipt),
            Audience::ExceptConnection(connection_id),
        )
        .await;
        true
    }

    /// Push an event to one connection only
    pub async fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        let registry = self.inner.registry.read().await;
        registry
            .connections
            .get(&connection_id)
            .is_some_and(|handle| handle.sender.send(event).is_ok())
    }

    /// User owning a connection
    pub async fn connection_user(&self, connection_id: ConnectionId) -> Option<i64> {
        let registry = self.inner.registry.read().await;
        registry.connections.get(&connection_id).map(|h| h.user_id)
    }

    /// Number of connections in `room(chat_id)`
    pub async fn room_size(&self, chat_id: i64) -> usize {
        let registry = self.inner.registry.read().await;
        registry.rooms.get(&chat_id).map_or(0, HashSet::len)
    }

    /// Number of open connections
    pub async fn connection_count(&self) -> usize {
        self.inner.registry.read().await.connections.len()
    }

    pub fn typing_timeout(&self) -> Duration {
        self.inner.typing_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::messaging::{ChatMessage, UserProfile};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn message(chat_id: i64, id: i64) -> ChatMessage {
        ChatMessage {
            id,
            chat_id,
            user_id: 1,
            text: "hi".to_string(),
            created_at: Utc::now(),
            is_edited: false,
            is_deleted: false,
            reply_to_id: None,
            is_read_by_peer: false,
            user: UserProfile {
                id: 1,
                name: "Alice".to_string(),
                username: "alice".to_string(),
                user_avatar: None,
            },
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_room_only() {
        let relay = Relay::without_presence();
        let (a, mut rx_a) = relay.connect(1).await;
        let (_b, mut rx_b) = relay.connect(2).await;
        relay.join(a, 10).await;

        let delivered = relay
            .publish(10, ServerEvent::MessageNew(message(10, 100)))
            .await;
        assert_eq!(delivered, 1);
        assert!(matches!(rx_a.try_recv(), Ok(ServerEvent::MessageNew(m)) if m.id == 100));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_join_is_idempotent() {
        let relay = Relay::without_presence();
        let (a, mut rx) = relay.connect(1).await;
        assert!(relay.join(a, 10).await);
        assert!(!relay.join(a, 10).await);
        assert_eq!(relay.room_size(10).await, 1);

        relay.publish(10, ServerEvent::MessageNew(message(10, 1))).await;
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_leave_and_empty_room_are_noops() {
        let relay = Relay::without_presence();
        let (a, _rx) = relay.connect(1).await;
        assert!(!relay.leave(a, 99).await);
        assert_eq!(
            relay.publish(99, ServerEvent::MessageNew(message(99, 1))).await,
            0
        );
    }

    #[tokio::test]
    async fn test_disconnect_removes_from_all_rooms() {
        let relay = Relay::without_presence();
        let (a, _rx) = relay.connect(1).await;
        relay.join(a, 1).await;
        relay.join(a, 2).await;
        assert!(relay.disconnect(a).await);
        assert_eq!(relay.room_size(1).await, 0);
        assert_eq!(relay.room_size(2).await, 0);
        assert_eq!(relay.connection_count().await, 0);
        assert!(!relay.disconnect(a).await);
    }

    #[tokio::test]
    async fn test_closed_queue_is_pruned() {
        let relay = Relay::without_presence();
        let (a, rx) = relay.connect(1).await;
        relay.join(a, 10).await;
        drop(rx);

        relay.publish(10, ServerEvent::MessageNew(message(10, 1))).await;
        assert_eq!(relay.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_typing_excludes_sender() {
        let relay = Relay::without_presence();
        let (a, mut rx_a) = relay.connect(1).await;
        let (b, mut rx_b) = relay.connect(2).await;
        relay.join(a, 10).await;
        relay.join(b, 10).await;

        assert!(relay.typing(a, 10, true).await);
        assert!(rx_a.try_recv().is_err());
        match rx_b.try_recv() {
            Ok(ServerEvent::Typing(signal)) => {
                assert_eq!(signal.user_id, 1);
                assert!(signal.is_typing);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_typing_outside_room_is_ignored() {
        let relay = Relay::without_presence();
        let (a, _rx) = relay.connect(1).await;
        assert!(!relay.typing(a, 10, true).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_expires_after_timeout() {
        let relay = Relay::new(Duration::from_secs(5), Arc::new(NoPresence));
        let (a, _rx_a) = relay.connect(1).await;
        let (b, mut rx_b) = relay.connect(2).await;
        relay.join(a, 10).await;
        relay.join(b, 10).await;

        relay.typing(a, 10, true).await;
        assert!(matches!(rx_b.recv().await, Some(ServerEvent::Typing(s)) if s.is_typing));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(matches!(rx_b.recv().await, Some(ServerEvent::Typing(s)) if !s.is_typing));
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_stop_cancels_expiry() {
        let relay = Relay::new(Duration::from_secs(5), Arc::new(NoPresence));
        let (a, _rx_a) = relay.connect(1).await;
        let (b, mut rx_b) = relay.connect(2).await;
        relay.join(a, 10).await;
        relay.join(b, 10).await;

        relay.typing(a, 10, true).await;
        relay.typing(a, 10, false).await;
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert!(matches!(rx_b.try_recv(), Ok(ServerEvent::Typing(s)) if s.is_typing));
        assert!(matches!(rx_b.try_recv(), Ok(ServerEvent::Typing(s)) if !s.is_typing));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnect_clears_typing() {
        let relay = Relay::without_presence();
        let (a, _rx_a) = relay.connect(1).await;
        let (b, mut rx_b) = relay.connect(2).await;
        relay.join(a, 10).await;
        relay.join(b, 10).await;
        relay.typing(a, 10, true).await;
        let _ = rx_b.try_recv();

        relay.disconnect(a).await;
        assert!(matches!(rx_b.try_recv(), Ok(ServerEvent::Typing(s)) if !s.is_typing && s.user_id == 1));
    }

    #[tokio::test]
    async fn test_read_echo_excludes_sender() {
        let relay = Relay::without_presence();
        let (a, mut rx_a) = relay.connect(1).await;
        let (b, mut rx_b) = relay.connect(2).await;
        relay.join(a, 10).await;
        relay.join(b, 10).await;

        assert!(relay.read_echo(b, 10, 100).await);
        assert!(rx_b.try_recv().is_err());
        match rx_a.try_recv() {
            Ok(ServerEvent::MessageRead(receipt)) => {
                assert_eq!(receipt.message_id, 100);
                assert_eq!(receipt.reader_id, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_except_user_skips_all_tabs_of_user() {
        let relay = Relay::without_presence();
        let (tab1, mut rx1) = relay.connect(2).await;
        let (tab2, mut rx2) = relay.connect(2).await;
        let (other, mut rx3) = relay.connect(1).await;
        for id in [tab1, tab2, other] {
            relay.join(id, 10).await;
        }

        let receipt = ReadReceipt {
            chat_id: 10,
            message_id: 5,
            reader_id: 2,
            read_at: Utc::now(),
        };
        let delivered = relay
            .publish_to(10, ServerEvent::MessageRead(receipt), Audience::ExceptUser(2))
            .await;
        assert_eq!(delivered, 1);
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_err());
        assert!(rx3.try_recv().is_ok());
    }

    #[derive(Default)]
    struct CountingPresence {
        online: AtomicUsize,
        offline: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Presence for CountingPresence {
        async fn connected(&self, _user_id: i64) {
            self.online.fetch_add(1, Ordering::SeqCst);
        }

        async fn disconnected(&self, _user_id: i64) {
            self.offline.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_presence_fires_on_first_and_last_connection() {
        let presence = Arc::new(CountingPresence::default());
        let relay = Relay::new(DEFAULT_TYPING_TIMEOUT, presence.clone());

        let (tab1, _rx1) = relay.connect(1).await;
        let (tab2, _rx2) = relay.connect(1).await;
        assert_eq!(presence.online.load(Ordering::SeqCst), 1);

        relay.disconnect(tab1).await;
        assert_eq!(presence.offline.load(Ordering::SeqCst), 0);
        relay.disconnect(tab2).await;
        assert_eq!(presence.offline.load(Ordering::SeqCst), 1);
    }

    #[derive(Default)]
    struct RecordingPresence {
        transitions: std::sync::Mutex<Vec<bool>>,
    }

    #[async_trait::async_trait]
    impl Presence for RecordingPresence {
        async fn connected(&self, _user_id: i64) {
            self.transitions.lock().unwrap().push(true);
        }

        async fn disconnected(&self, _user_id: i64) {
            self.transitions.lock().unwrap().push(false);
        }
    }

    async fn wait_for_connections(relay: &Relay, count: usize) {
        while relay.connection_count().await != count {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_reconnect_racing_last_disconnect_stays_online() {
        let presence = Arc::new(RecordingPresence::default());
        let relay = Relay::new(DEFAULT_TYPING_TIMEOUT, presence.clone());
        let (old_tab, _rx) = relay.connect(1).await;

        // Both transitions are decided before either is applied
        let gate = relay.inner.presence_gate.lock().await;
        let leaving = tokio::spawn({
            let relay = relay.clone();
            async move { relay.disconnect(old_tab).await }
        });
        wait_for_connections(&relay, 0).await;
        let arriving = tokio::spawn({
            let relay = relay.clone();
            async move { relay.connect(1).await }
        });
        wait_for_connections(&relay, 1).await;
        drop(gate);

        assert!(leaving.await.unwrap());
        let (_new_tab, _new_rx) = arriving.await.unwrap();

        let transitions = presence.transitions.lock().unwrap().clone();
        assert!(transitions.iter().all(|online| *online));
        assert_eq!(transitions.last(), Some(&true));
    }
}
