//! Per-connection subscription manager.
//!
//! A session always listens on its own user channel and, after
//! `join_conversation`, on conversation groups. Filtering happens
//! server-side against each event's [`Audience`].

use std::collections::HashSet;

use crate::domain::{Audience, ChatEvent, ConversationId, UserId};

/// Channels a single WebSocket connection listens on.
#[derive(Debug)]
pub struct SubscriptionManager {
    user_id: UserId,
    conversations: HashSet<ConversationId>,
}

impl SubscriptionManager {
    /// Creates a manager listening only on `user_id`'s channel.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            conversations: HashSet::new(),
        }
    }

    /// Joins a conversation group. Returns `false` if already joined.
    pub fn join(&mut self, conversation: ConversationId) -> bool {
        self.conversations.insert(conversation)
    }

    /// Leaves a conversation group. Returns `false` if not joined.
    pub fn leave(&mut self, conversation: ConversationId) -> bool {
        self.conversations.remove(&conversation)
    }

    /// Returns `true` if the event should be forwarded to this session.
    #[must_use]
    pub fn matches(&self, event: &ChatEvent) -> bool {
        if event.excluded_user() == Some(self.user_id) {
            return false;
        }
        match event.audience() {
            Audience::User(user) => user == self.user_id,
            Audience::Conversation(id) => self.conversations.contains(&id),
        }
    }

    /// Number of joined conversation groups.
    #[must_use]
    pub fn count(&self) -> usize {
        self.conversations.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn typing(conversation: i64, user: i64) -> ChatEvent {
        ChatEvent::TypingChanged {
            conversation_id: ConversationId::new(conversation),
            user_id: UserId::new(user),
            is_typing: true,
        }
    }

    fn receipt(sender: i64) -> ChatEvent {
        ChatEvent::MessagesRead {
            conversation_id: ConversationId::new(1),
            reader_id: UserId::new(99),
            sender_id: UserId::new(sender),
            count: 2,
            read_at: Utc::now(),
        }
    }

    #[test]
    fn user_channel_is_always_on() {
        let mgr = SubscriptionManager::new(UserId::new(1));
        assert!(mgr.matches(&receipt(1)));
        assert!(!mgr.matches(&receipt(2)));
    }

    #[test]
    fn groups_need_a_join() {
        let mut mgr = SubscriptionManager::new(UserId::new(1));
        assert!(!mgr.matches(&typing(7, 2)));
        assert!(mgr.join(ConversationId::new(7)));
        assert!(!mgr.join(ConversationId::new(7)));
        assert!(mgr.matches(&typing(7, 2)));
        assert_eq!(mgr.count(), 1);
        assert!(mgr.leave(ConversationId::new(7)));
        assert!(!mgr.matches(&typing(7, 2)));
    }

    #[test]
    fn typist_does_not_see_own_indicator() {
        let mut mgr = SubscriptionManager::new(UserId::new(2));
        mgr.join(ConversationId::new(7));
        assert!(!mgr.matches(&typing(7, 2)));
    }
}
