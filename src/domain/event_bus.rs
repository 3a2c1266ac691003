//! Broadcast channel for chat events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Every chat
//! mutation publishes a [`ChatEvent`] through the bus, and every WebSocket
//! connection subscribes and keeps the events addressed to its user or to
//! the conversation groups it joined.

use tokio::sync::broadcast;

use super::ChatEvent;

/// Broadcast bus for [`ChatEvent`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity
/// (default 10 000). When the ring buffer is full, the oldest events are
/// dropped for lagging receivers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChatEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    /// If there are no active receivers, the event is silently dropped.
    pub fn publish(&self, event: ChatEvent) -> usize {
        let kind = event.event_type_str();
        let conversation_id = event.conversation_id();
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::trace!(kind, %conversation_id, delivered, "chat event published");
        delivered
    }

    /// Creates a new receiver that will receive all future events.
    ///
    /// Each WebSocket connection should call this once on connect.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ConversationId, UserId};

    fn typing(conversation: i64) -> ChatEvent {
        ChatEvent::TypingChanged {
            conversation_id: ConversationId::new(conversation),
            user_id: UserId::new(1),
            is_typing: true,
        }
    }

    #[test]
    fn publish_without_receivers_returns_zero() {
        let bus = EventBus::new(100);
        assert_eq!(bus.publish(typing(1)), 0);
    }

    #[tokio::test]
    async fn subscriber_receives_event() {
        let bus = EventBus::new(100);
        let mut rx = bus.subscribe();

        bus.publish(typing(7));

        let Ok(event) = rx.recv().await else {
            panic!("expected to receive event");
        };
        assert_eq!(event.conversation_id(), ConversationId::new(7));
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(100);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.publish(typing(3)), 2);

        let Ok(e1) = rx1.recv().await else {
            panic!("rx1 failed");
        };
        let Ok(e2) = rx2.recv().await else {
            panic!("rx2 failed");
        };
        assert_eq!(e1.conversation_id(), e2.conversation_id());
    }

    #[tokio::test]
    async fn lagging_receiver_drops_oldest() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for i in 0..4 {
            bus.publish(typing(i));
        }
        let Err(broadcast::error::RecvError::Lagged(missed)) = rx.recv().await else {
            panic!("receiver should report lag");
        };
        assert_eq!(missed, 2);
        let Ok(event) = rx.recv().await else {
            panic!("newest events should remain");
        };
        assert_eq!(event.conversation_id(), ConversationId::new(2));
    }

    #[test]
    fn receiver_count_tracks_subscribers() {
        let bus = EventBus::new(100);
        assert_eq!(bus.receiver_count(), 0);

        let rx1 = bus.subscribe();
        assert_eq!(bus.receiver_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.receiver_count(), 2);

        drop(rx1);
        assert_eq!(bus.receiver_count(), 1);
    }
}
