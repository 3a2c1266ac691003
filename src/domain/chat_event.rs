//! Chat events fanned out to connected sessions.
//!
//! Every chat mutation emits a [`ChatEvent`] through the [`super::EventBus`].
//! Each event names its [`Audience`]; WebSocket connections forward the
//! events whose audience they belong to.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::chat::MessageView;
use super::{ConversationId, UserId};

/// Who should receive an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Audience {
    /// Every session of one user (the user channel).
    User(UserId),
    /// Every session that joined a conversation group.
    Conversation(ConversationId),
}

/// Domain event emitted after a chat mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A new message for the recipient's user channel.
    #[serde(rename = "receive_message")]
    MessageReceived {
        /// Recipient of the message.
        #[serde(skip)]
        recipient_id: UserId,
        /// The message.
        message: MessageView,
    },

    /// Read receipt sent to the participant whose messages were read.
    MessagesRead {
        /// Conversation.
        conversation_id: ConversationId,
        /// Participant who read the messages.
        reader_id: UserId,
        /// Participant whose messages were read.
        #[serde(skip)]
        sender_id: UserId,
        /// Messages that changed state.
        count: u64,
        /// Read timestamp.
        read_at: DateTime<Utc>,
    },

    /// Typing indicator for a conversation group.
    #[serde(rename = "user_typing")]
    TypingChanged {
        /// Conversation.
        conversation_id: ConversationId,
        /// Participant whose state changed.
        user_id: UserId,
        /// New state.
        is_typing: bool,
    },
}

impl ChatEvent {
    /// Returns the audience this event is routed to.
    #[must_use]
    pub const fn audience(&self) -> Audience {
        match self {
            Self::MessageReceived { recipient_id, .. } => Audience::User(*recipient_id),
            Self::MessagesRead { sender_id, .. } => Audience::User(*sender_id),
            Self::TypingChanged {
                conversation_id, ..
            } => Audience::Conversation(*conversation_id),
        }
    }

    /// User whose own sessions must not receive the event.
    #[must_use]
    pub const fn excluded_user(&self) -> Option<UserId> {
        match self {
            Self::TypingChanged { user_id, .. } => Some(*user_id),
            _ => None,
        }
    }

    /// Conversation the event belongs to.
    #[must_use]
    pub const fn conversation_id(&self) -> ConversationId {
        match self {
            Self::MessageReceived { message, .. } => message.conversation_id,
            Self::MessagesRead {
                conversation_id, ..
            }
            | Self::TypingChanged {
                conversation_id, ..
            } => *conversation_id,
        }
    }

    /// Returns the event name as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::MessageReceived { .. } => "receive_message",
            Self::MessagesRead { .. } => "messages_read",
            Self::TypingChanged { .. } => "user_typing",
        }
    }
}
