//! State of one open chat
//!
//! Pure and synchronous: the session controller feeds it REST results and
//! relay events, the UI reads from it. Time is passed in so typing
//! indicators can be tested without sleeping.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::shared::event::{ReadReceipt, ServerEvent, TypingSignal};
use crate::shared::messaging::ChatMessage;

/// How long a typing indicator stays up without a fresh signal
pub const TYPING_QUIET_PERIOD: Duration = Duration::from_secs(2);

/// What an applied event changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewChange {
    /// Event for another chat, or a signal from the current user
    Ignored,
    MessageAdded(i64),
    /// The message was already held
    Duplicate(i64),
    /// Own messages up to `message_id` are now read; `updated` counts
    /// messages whose flag flipped
    ReadUpTo { message_id: i64, updated: usize },
    Typing { user_id: i64, is_typing: bool },
}

/// Ordered, duplicate-free messages of one chat
#[derive(Debug, Clone)]
pub struct ChatView {
    chat_id: i64,
    self_id: i64,
    /// Ascending id
    messages: Vec<ChatMessage>,
    /// user id -> indicator deadline
    typing: HashMap<i64, Instant>,
}

impl ChatView {
    pub fn new(chat_id: i64, self_id: i64) -> Self {
        Self {
            chat_id,
            self_id,
            messages: Vec::new(),
            typing: HashMap::new(),
        }
    }

    /// View initialised from a fetched page
    pub fn with_snapshot(chat_id: i64, self_id: i64, messages: Vec<ChatMessage>) -> Self {
        let mut view = Self::new(chat_id, self_id);
        view.merge_snapshot(messages);
        view
    }

    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn contains(&self, message_id: i64) -> bool {
        self.position(message_id).is_ok()
    }

    pub fn last_message_id(&self) -> Option<i64> {
        self.messages.last().map(|m| m.id)
    }

    /// Newest message written by someone else; what a mark-read should cover
    pub fn latest_peer_message_id(&self) -> Option<i64> {
        self.messages
            .iter()
            .rev()
            .find(|m| !m.is_from(self.self_id))
            .map(|m| m.id)
    }

    fn position(&self, message_id: i64) -> Result<usize, usize> {
        self.messages.binary_search_by_key(&message_id, |m| m.id)
    }

    /// Merge one message. Returns false when it belongs to another chat or
    /// is already held.
    pub fn merge_message(&mut self, message: ChatMessage) -> bool {
        if message.chat_id != self.chat_id {
            return false;
        }
        match self.position(message.id) {
            Ok(_) => false,
            Err(at) => {
                self.messages.insert(at, message);
                true
            }
        }
    }

    /// Union a fetched page into the view; the server copy of a message
    /// replaces the local one
    pub fn merge_snapshot(&mut self, messages: Vec<ChatMessage>) {
        for message in messages {
            if message.chat_id != self.chat_id {
                continue;
            }
            match self.position(message.id) {
                Ok(at) => self.messages[at] = message,
                Err(at) => self.messages.insert(at, message),
            }
        }
    }

    /// Flag own messages up to `message_id` as read by the peer
    pub fn apply_read(&mut self, message_id: i64) -> usize {
        let self_id = self.self_id;
        let mut updated = 0;
        for message in self
            .messages
            .iter_mut()
            .take_while(|m| m.id <= message_id)
            .filter(|m| m.is_from(self_id) && !m.is_read_by_peer)
        {
            message.is_read_by_peer = true;
            updated += 1;
        }
        updated
    }

    pub fn set_typing(&mut self, user_id: i64, is_typing: bool, now: Instant) {
        if is_typing {
            self.typing.insert(user_id, now + TYPING_QUIET_PERIOD);
        } else {
            self.typing.remove(&user_id);
        }
    }

    /// Users currently shown as typing
    pub fn typing_users(&self, now: Instant) -> Vec<i64> {
        let mut users: Vec<i64> = self
            .typing
            .iter()
            .filter(|(_, deadline)| **deadline > now)
            .map(|(user_id, _)| *user_id)
            .collect();
        users.sort_unstable();
        users
    }

    /// Drop expired typing indicators
    pub fn prune_typing(&mut self, now: Instant) {
        self.typing.retain(|_, deadline| *deadline > now);
    }

    /// Apply a relay event
    pub fn apply(&mut self, event: &ServerEvent, now: Instant) -> ViewChange {
        if event.chat_id() != Some(self.chat_id) {
            return ViewChange::Ignored;
        }
        match event {
            ServerEvent::MessageNew(message) => {
                let id = message.id;
                if self.merge_message(message.clone()) {
                    ViewChange::MessageAdded(id)
                } else {
                    ViewChange::Duplicate(id)
                }
            }
            // Another device of the same user may echo its own reads
            ServerEvent::MessageRead(ReadReceipt { reader_id, .. }) if *reader_id == self.self_id => {
                ViewChange::Ignored
            }
            ServerEvent::MessageRead(receipt) => ViewChange::ReadUpTo {
                message_id: receipt.message_id,
                updated: self.apply_read(receipt.message_id),
            },
            ServerEvent::Typing(TypingSignal { user_id, .. }) if *user_id == self.self_id => {
                ViewChange::Ignored
            }
            ServerEvent::Typing(signal) => {
                self.set_typing(signal.user_id, signal.is_typing, now);
                ViewChange::Typing {
                    user_id: signal.user_id,
                    is_typing: signal.is_typing,
                }
            }
            ServerEvent::Connected(_) => ViewChange::Ignored,
        }
    }
}
