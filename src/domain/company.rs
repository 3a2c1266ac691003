//! Companies and the registration requests that create them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{CompanyId, CompanyRequestId, UserId};
use crate::error::AppError;

/// Editable company fields, shared by requests, creation and updates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CompanyDetails {
    /// Legal or trading name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Industry or sector.
    #[serde(default)]
    pub industry: Option<String>,
    /// Public web site.
    #[serde(default)]
    pub website: Option<String>,
    /// Postal address.
    #[serde(default)]
    pub address: Option<String>,
    /// Contact phone.
    #[serde(default)]
    pub phone: Option<String>,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// Logo URL returned by the file upload endpoint.
    #[serde(default)]
    pub logo_url: Option<String>,
}

impl CompanyDetails {
    /// Trims the name and rejects empty names.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] when the name is blank or longer
    /// than 200 characters.
    pub fn validated(mut self) -> Result<Self, AppError> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(AppError::invalid("company name is required"));
        }
        if self.name.chars().count() > 200 {
            return Err(AppError::invalid("company name must be at most 200 characters"));
        }
        Ok(self)
    }

    /// Case-insensitive substring match over the searchable fields.
    #[must_use]
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        [
            Some(&self.name),
            self.description.as_ref(),
            self.industry.as_ref(),
            self.address.as_ref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&term))
    }
}

/// A registered company.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Company {
    /// Row id.
    pub id: CompanyId,
    /// Owning employer.
    pub owner_id: UserId,
    /// Company fields.
    #[serde(flatten)]
    pub details: CompanyDetails,
    /// Verified companies went through an approved registration request.
    pub is_verified: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update.
    pub updated_at: DateTime<Utc>,
}

/// Review state of a [`CompanyRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompanyRequestStatus {
    /// Waiting for an administrator.
    Pending,
    /// Accepted; the company exists.
    Approved,
    /// Declined with a reason.
    Rejected,
}

text_enum!(CompanyRequestStatus {
    Pending => "PENDING",
    Approved => "APPROVED",
    Rejected => "REJECTED",
});

/// A user's request to register a company.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CompanyRequest {
    /// Row id.
    pub id: CompanyRequestId,
    /// Submitting user.
    pub requester_id: UserId,
    /// Proposed company fields.
    #[serde(flatten)]
    pub details: CompanyDetails,
    /// Review state.
    pub status: CompanyRequestStatus,
    /// Reason given on rejection.
    pub reject_reason: Option<String>,
    /// Reviewing administrator.
    pub reviewed_by: Option<UserId>,
    /// Review time.
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Company created on approval.
    pub company_id: Option<CompanyId>,
    /// Submission time.
    pub created_at: DateTime<Utc>,
}

/// Outcome recorded when a request is decided.
#[derive(Debug, Clone)]
pub enum CompanyDecision {
    /// Approve; the store creates the company and links it.
    Approve,
    /// Reject with a reason.
    Reject(String),
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn blank_names_are_rejected() {
        let details = CompanyDetails {
            name: "   ".into(),
            ..CompanyDetails::default()
        };
        assert!(details.validated().is_err());
    }

    #[test]
    fn search_covers_description_and_address() {
        let details = CompanyDetails {
            name: "Acme".into(),
            description: Some("Makes Rockets".into()),
            address: Some("Hanoi".into()),
            ..CompanyDetails::default()
        };
        assert!(details.matches("rocket"));
        assert!(details.matches("HANOI"));
        assert!(!details.matches("bakery"));
    }

    #[test]
    fn request_status_parses_case_insensitively() {
        let Ok(status) = "pending".parse::<CompanyRequestStatus>() else {
            panic!("status should parse");
        };
        assert_eq!(status, CompanyRequestStatus::Pending);
    }
}
