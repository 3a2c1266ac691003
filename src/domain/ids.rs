//! Type-safe entity identifiers.
//!
//! Every aggregate gets its own newtype over the `BIGSERIAL` row id so that,
//! say, a [`UserId`] can never be passed where a [`ProfileId`] is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Serialize,
            Deserialize,
            sqlx::Type,
            utoipa::ToSchema,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw row id.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the raw row id.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id!(
    /// Identifier of a user account.
    UserId
);
entity_id!(
    /// Identifier of a company.
    CompanyId
);
entity_id!(
    /// Identifier of a company registration request.
    CompanyRequestId
);
entity_id!(
    /// Identifier of a job post.
    JobPostId
);
entity_id!(
    /// Identifier of a student profile.
    ProfileId
);
entity_id!(
    /// Identifier of a job application.
    ApplicationId
);
entity_id!(
    /// Identifier of an uploaded file record.
    FileId
);
entity_id!(
    /// Identifier of an employer/student conversation.
    ConversationId
);
entity_id!(
    /// Identifier of a chat message.
    MessageId
);
entity_id!(
    /// Identifier of an AI assistant session.
    AiSessionId
);
entity_id!(
    /// Identifier of a message inside an AI assistant session.
    AiMessageId
);

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_bare_number() {
        let id = ConversationId::new(42);
        let Ok(json) = serde_json::to_string(&id) else {
            panic!("serialization failed");
        };
        assert_eq!(json, "42");

        let Ok(back) = serde_json::from_str::<ConversationId>("42") else {
            panic!("deserialization failed");
        };
        assert_eq!(back, id);
    }

    #[test]
    fn display_matches_raw_value() {
        assert_eq!(UserId::new(7).to_string(), "7");
        assert_eq!(i64::from(JobPostId::from(9)), 9);
    }
}
