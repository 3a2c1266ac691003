//! Domain layer: entities, value types, and the chat event system.
//!
//! Types here are storage-agnostic. The persistence layer maps them to rows
//! and the API layer projects them into response bodies.

/// Implements `as_str`, `Display` and `FromStr` for a fieldless enum stored
/// as text. Parsing is case-insensitive.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Canonical text form, as stored and serialized.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::error::AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.trim().eq_ignore_ascii_case($text) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(crate::error::AppError::invalid(format!(
                    "unknown {}: {s}",
                    stringify!($name)
                )))
            }
        }
    };
}

pub mod ai_chat;
pub mod application;
pub mod chat;
pub mod chat_event;
pub mod company;
pub mod event_bus;
pub mod file;
pub mod ids;
pub mod job_post;
pub mod logs;
pub mod pagination;
pub mod profile;
pub mod user;

pub use chat_event::{Audience, ChatEvent};
pub use event_bus::EventBus;
pub use ids::{
    AiMessageId, AiSessionId, ApplicationId, CompanyId, CompanyRequestId, ConversationId, FileId,
    JobPostId, MessageId, ProfileId, UserId,
};
pub use pagination::{Page, PageRequest};
pub use user::Role;
