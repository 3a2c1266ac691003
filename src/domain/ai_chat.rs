//! AI assistant sessions and the history window sent to the model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{AiMessageId, AiSessionId, UserId};

/// Title given to sessions created on first use.
pub const DEFAULT_SESSION_TITLE: &str = "New Chat Conversation";

/// Most recent messages considered for the history window.
pub const HISTORY_MESSAGE_LIMIT: usize = 50;

/// Character budget of the history window.
pub const HISTORY_CHAR_BUDGET: usize = 60_000;

/// Author of an assistant conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AiRole {
    /// Instructions prepended by the server.
    System,
    /// The end user.
    User,
    /// The model.
    Assistant,
}

text_enum!(AiRole {
    System => "system",
    User => "user",
    Assistant => "assistant",
});

/// A user's assistant session. At most one per user is active.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AiSession {
    /// Row id.
    pub id: AiSessionId,
    /// Owner.
    pub user_id: UserId,
    /// Display title.
    pub title: String,
    /// Whether new messages go to this session.
    pub is_active: bool,
    /// When the session was ended by a restart.
    pub ended_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A stored turn of an assistant session.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AiMessage {
    /// Row id.
    pub id: AiMessageId,
    /// Owning session.
    pub session_id: AiSessionId,
    /// Author.
    pub role: AiRole,
    /// Text.
    pub content: String,
    /// Rough token estimate.
    pub token_count: i32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Rough token estimate used for bookkeeping: one token per three characters.
#[must_use]
pub fn estimate_tokens(content: &str) -> i32 {
    i32::try_from(content.chars().count() / 3).unwrap_or(i32::MAX)
}

/// Chooses the history sent to the model.
///
/// `newest_first` must be ordered newest to oldest. Messages are taken
/// while the running character total stays within [`HISTORY_CHAR_BUDGET`],
/// at most [`HISTORY_MESSAGE_LIMIT`] of them, and returned oldest first.
/// System turns are skipped.
#[must_use]
pub fn select_history(newest_first: Vec<AiMessage>) -> Vec<AiMessage> {
    let mut used = 0usize;
    let mut selected: Vec<AiMessage> = Vec::new();
    for message in newest_first.into_iter().take(HISTORY_MESSAGE_LIMIT) {
        let len = message.content.chars().count();
        if used + len > HISTORY_CHAR_BUDGET {
            break;
        }
        used += len;
        if message.role != AiRole::System {
            selected.push(message);
        }
    }
    selected.reverse();
    selected
}

/// Reply returned by the assistant endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AiReply {
    /// Session the exchange was stored in.
    pub session_id: AiSessionId,
    /// Assistant text.
    pub reply: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: i64, role: AiRole, len: usize) -> AiMessage {
        AiMessage {
            id: AiMessageId::new(id),
            session_id: AiSessionId::new(1),
            role,
            content: "x".repeat(len),
            token_count: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn history_is_chronological() {
        let newest_first = vec![
            msg(3, AiRole::Assistant, 10),
            msg(2, AiRole::User, 10),
            msg(1, AiRole::Assistant, 10),
        ];
        let ids: Vec<i64> = select_history(newest_first)
            .into_iter()
            .map(|m| m.id.get())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn history_stops_at_char_budget() {
        let newest_first = vec![
            msg(3, AiRole::User, 40_000),
            msg(2, AiRole::Assistant, 30_000),
            msg(1, AiRole::User, 5),
        ];
        let selected = select_history(newest_first);
        assert_eq!(selected.len(), 1);
        assert!(selected.first().is_some_and(|m| m.id.get() == 3));
    }

    #[test]
    fn history_caps_message_count() {
        let newest_first: Vec<AiMessage> = (0..80)
            .rev()
            .map(|i| msg(i, AiRole::User, 1))
            .collect();
        assert_eq!(select_history(newest_first).len(), HISTORY_MESSAGE_LIMIT);
    }

    #[test]
    fn token_estimate_is_a_third_of_length() {
        assert_eq!(estimate_tokens("abcdefghi"), 3);
        assert_eq!(estimate_tokens("ab"), 0);
    }
}
