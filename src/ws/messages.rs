//! WebSocket message types: envelope, commands, and events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ConversationId;
use crate::domain::chat::SendMessage;
use crate::error::AppError;

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    #[serde(default)]
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

impl WsMessage {
    /// Reply to the command with id `id`.
    #[must_use]
    pub fn response(id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::new(id.into(), WsMessageType::Response, payload)
    }

    /// Server-initiated event.
    #[must_use]
    pub fn event(payload: serde_json::Value) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), WsMessageType::Event, payload)
    }

    /// Error reply with an HTTP-like status code.
    #[must_use]
    pub fn error(id: impl Into<String>, code: u16, message: impl Into<String>) -> Self {
        Self::new(
            id.into(),
            WsMessageType::Error,
            serde_json::json!({ "code": code, "message": message.into() }),
        )
    }

    /// Error reply for a failed command.
    #[must_use]
    pub fn from_app_error(id: impl Into<String>, err: &AppError) -> Self {
        Self::error(id, err.status_code().as_u16(), err.public_message())
    }

    fn new(id: String, msg_type: WsMessageType, payload: serde_json::Value) -> Self {
        Self {
            id,
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Serializes the envelope for a text frame.
    #[must_use]
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Commands that a client can send over WebSocket, read from
/// `payload.command`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Send a message to a conversation or a recipient.
    SendMessage(SendMessage),
    /// Mark the counterpart's messages in a conversation as read.
    MarkAsRead {
        /// Conversation.
        #[serde(alias = "conversationId")]
        conversation_id: ConversationId,
    },
    /// Update the caller's typing flag.
    UpdateTyping {
        /// Conversation.
        #[serde(alias = "conversationId")]
        conversation_id: ConversationId,
        /// New state.
        #[serde(alias = "isTyping")]
        is_typing: bool,
    },
    /// Start receiving the conversation group's events.
    JoinConversation {
        /// Conversation.
        #[serde(alias = "conversationId")]
        conversation_id: ConversationId,
    },
    /// Stop receiving the conversation group's events.
    LeaveConversation {
        /// Conversation.
        #[serde(alias = "conversationId")]
        conversation_id: ConversationId,
    },
}
