//! Student profiles.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ProfileId, UserId};
use crate::error::AppError;

/// Editable profile fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProfileDetails {
    /// Name shown to employers.
    pub full_name: String,
    /// Contact phone.
    #[serde(default)]
    pub phone: Option<String>,
    /// Date of birth.
    #[serde(default)]
    #[schema(value_type = Option<String>, format = Date)]
    pub date_of_birth: Option<NaiveDate>,
    /// University attended.
    #[serde(default)]
    pub university: Option<String>,
    /// Field of study.
    #[serde(default)]
    pub major: Option<String>,
    /// Expected or actual graduation year.
    #[serde(default)]
    pub graduation_year: Option<i32>,
    /// Short introduction.
    #[serde(default)]
    pub bio: Option<String>,
    /// Self-declared skills.
    #[serde(default)]
    pub skills: Vec<String>,
    /// Default resume for applications.
    #[serde(default)]
    pub resume_url: Option<String>,
    /// Avatar image.
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl ProfileDetails {
    /// Trims and validates the fields.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] when the full name is blank or
    /// the graduation year is implausible.
    pub fn validated(mut self) -> Result<Self, AppError> {
        self.full_name = self.full_name.trim().to_string();
        if self.full_name.is_empty() {
            return Err(AppError::invalid("full_name is required"));
        }
        if self
            .graduation_year
            .is_some_and(|y| !(1950..=2100).contains(&y))
        {
            return Err(AppError::invalid("graduation_year is out of range"));
        }
        self.skills.retain(|s| !s.trim().is_empty());
        Ok(self)
    }
}

/// A stored profile. Each user has at most one.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Profile {
    /// Row id.
    pub id: ProfileId,
    /// Owning user.
    pub user_id: UserId,
    /// Profile fields.
    #[serde(flatten)]
    pub details: ProfileDetails,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update.
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_full_name() {
        assert!(ProfileDetails::default().validated().is_err());
        let details = ProfileDetails {
            full_name: " Linh ".into(),
            skills: vec!["".into(), "Excel".into()],
            ..ProfileDetails::default()
        };
        let validated = details.validated();
        assert!(validated.as_ref().is_ok_and(|d| d.full_name == "Linh"));
        assert!(validated.is_ok_and(|d| d.skills == vec!["Excel".to_string()]));
    }

    #[test]
    fn rejects_absurd_graduation_year() {
        let details = ProfileDetails {
            full_name: "Linh".into(),
            graduation_year: Some(3000),
            ..ProfileDetails::default()
        };
        assert!(details.validated().is_err());
    }
}
