//! Employer/student conversations and their message log.
//!
//! A [`Conversation`] is keyed by its `(employer, student)` pair: there is
//! at most one per pair, whatever job post started it. Messages are an
//! append-only log ordered by `(created_at, id)`; a message is unread for a
//! participant when it is not yet read and that participant did not send it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ConversationId, JobPostId, MessageId, Role, UserId};
use crate::error::AppError;

/// Longest accepted message body, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Characters kept in the conversation's last-message preview.
pub const PREVIEW_CHARS: usize = 100;

/// A stored conversation.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    /// Row id.
    pub id: ConversationId,
    /// Employer participant.
    pub employer_id: UserId,
    /// Student participant.
    pub student_id: UserId,
    /// Job post the conversation was started from.
    pub job_post_id: Option<JobPostId>,
    /// Time of the newest message.
    pub last_message_at: Option<DateTime<Utc>>,
    /// Preview of the newest message.
    pub last_message: Option<String>,
    /// Employer typing flag.
    pub is_employer_typing: bool,
    /// Student typing flag.
    pub is_student_typing: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// `true` if `user` is one of the two participants.
    #[must_use]
    pub fn has_participant(&self, user: UserId) -> bool {
        self.employer_id == user || self.student_id == user
    }

    /// The other participant, or `None` if `user` is not a participant.
    #[must_use]
    pub fn counterpart(&self, user: UserId) -> Option<UserId> {
        if user == self.employer_id {
            Some(self.student_id)
        } else if user == self.student_id {
            Some(self.employer_id)
        } else {
            None
        }
    }

    /// Key used for ordering conversation lists: newest activity first.
    #[must_use]
    pub fn activity_at(&self) -> DateTime<Utc> {
        self.last_message_at.unwrap_or(self.created_at)
    }

    /// Sets the typing flag on `user`'s side.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] if `user` is not a participant.
    pub fn set_typing(&mut self, user: UserId, is_typing: bool) -> Result<(), AppError> {
        if user == self.employer_id {
            self.is_employer_typing = is_typing;
        } else if user == self.student_id {
            self.is_student_typing = is_typing;
        } else {
            return Err(not_a_member());
        }
        Ok(())
    }
}

/// Error returned when a user acts on a conversation they are not part of.
#[must_use]
pub fn not_a_member() -> AppError {
    AppError::forbidden("not a member of this conversation")
}

/// The `(employer, student)` key of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantPair {
    /// Employer participant.
    pub employer_id: UserId,
    /// Student participant.
    pub student_id: UserId,
}

impl ParticipantPair {
    /// Orders two users into employer and student by role.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] unless exactly one user is an
    /// employer and the other a student.
    pub fn resolve(a: (UserId, Role), b: (UserId, Role)) -> Result<Self, AppError> {
        if a.0 == b.0 {
            return Err(AppError::invalid("cannot start a conversation with yourself"));
        }
        match (a.1, b.1) {
            (Role::Employer, Role::Student) => Ok(Self {
                employer_id: a.0,
                student_id: b.0,
            }),
            (Role::Student, Role::Employer) => Ok(Self {
                employer_id: b.0,
                student_id: a.0,
            }),
            _ => Err(AppError::invalid(
                "conversations are between one employer and one student",
            )),
        }
    }
}

/// A stored chat message.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Row id.
    pub id: MessageId,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// Author.
    pub sender_id: UserId,
    /// Body.
    pub content: String,
    /// Read by the recipient.
    pub is_read: bool,
    /// When it was read.
    pub read_at: Option<DateTime<Utc>>,
    /// Send time.
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Unread from `user`'s point of view.
    #[must_use]
    pub fn is_unread_for(&self, user: UserId) -> bool {
        !self.is_read && self.sender_id != user
    }
}

/// Trims and bounds a message body.
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] for blank content or content
/// longer than [`MAX_MESSAGE_CHARS`].
pub fn validate_content(content: &str) -> Result<String, AppError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::invalid("message content is required"));
    }
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::invalid(format!(
            "message content must be at most {MAX_MESSAGE_CHARS} characters"
        )));
    }
    Ok(content.to_string())
}

/// Conversation list preview: the first [`PREVIEW_CHARS`] characters,
/// followed by `...` when the content was cut.
#[must_use]
pub fn preview(content: &str) -> String {
    let mut chars = content.char_indices();
    match chars.nth(PREVIEW_CHARS) {
        Some((cut, _)) => {
            let head = content.get(..cut).unwrap_or(content);
            format!("{head}...")
        }
        None => content.to_string(),
    }
}

/// Where a new message goes: an existing conversation, or the conversation
/// with a recipient (created on first contact).
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SendMessage {
    /// Existing conversation.
    #[serde(default, alias = "conversationId")]
    pub conversation_id: Option<ConversationId>,
    /// Recipient, used when `conversation_id` is absent.
    #[serde(default, alias = "recipientId")]
    pub recipient_id: Option<UserId>,
    /// Job post context recorded on a newly created conversation.
    #[serde(default, alias = "jobPostId")]
    pub job_post_id: Option<JobPostId>,
    /// Body.
    pub content: String,
}

/// A conversation as seen by one participant.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConversationSummary {
    /// Row id.
    pub id: ConversationId,
    /// Employer participant.
    pub employer_id: UserId,
    /// Employer display name.
    pub employer_name: String,
    /// Student participant.
    pub student_id: UserId,
    /// Student display name.
    pub student_name: String,
    /// Job post context.
    pub job_post_id: Option<JobPostId>,
    /// Job post title, if the post still exists.
    pub job_post_title: Option<String>,
    /// Time of the newest message.
    pub last_message_at: Option<DateTime<Utc>>,
    /// Preview of the newest message.
    pub last_message: Option<String>,
    /// Employer typing flag.
    pub is_employer_typing: bool,
    /// Student typing flag.
    pub is_student_typing: bool,
    /// Messages unread by the viewer.
    pub unread_count: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A message with its sender's display name.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageView {
    /// Row id.
    pub id: MessageId,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// Author.
    pub sender_id: UserId,
    /// Author display name.
    pub sender_name: String,
    /// Body.
    pub content: String,
    /// Read by the recipient.
    pub is_read: bool,
    /// When it was read.
    pub read_at: Option<DateTime<Utc>>,
    /// Send time.
    pub created_at: DateTime<Utc>,
}

impl MessageView {
    /// Attaches a sender name to a stored message.
    #[must_use]
    pub fn new(message: ChatMessage, sender_name: String) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            sender_name,
            content: message.content,
            is_read: message.is_read,
            read_at: message.read_at,
            created_at: message.created_at,
        }
    }
}
