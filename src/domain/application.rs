//! Job applications submitted by students.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ApplicationId, CompanyId, JobPostId, ProfileId, UserId};
use crate::error::AppError;

/// Review pipeline of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    /// Submitted, not yet looked at.
    Pending,
    /// Being reviewed by the employer.
    Reviewing,
    /// Interview scheduled.
    Interviewing,
    /// Offer made.
    Offered,
    /// Offer accepted.
    Accepted,
    /// Declined by the employer.
    Rejected,
    /// Pulled back by the applicant.
    Withdrawn,
}

text_enum!(ApplicationStatus {
    Pending => "PENDING",
    Reviewing => "REVIEWING",
    Interviewing => "INTERVIEWING",
    Offered => "OFFERED",
    Accepted => "ACCEPTED",
    Rejected => "REJECTED",
    Withdrawn => "WITHDRAWN",
});

impl ApplicationStatus {
    /// Final states admit no further transitions by the applicant.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected | Self::Withdrawn)
    }
}

/// A stored application.
#[derive(Debug, Clone, Serialize)]
pub struct Application {
    /// Row id.
    pub id: ApplicationId,
    /// Target job post.
    pub job_post_id: JobPostId,
    /// Applicant profile.
    pub profile_id: ProfileId,
    /// Current status.
    pub status: ApplicationStatus,
    /// Cover letter.
    pub cover_letter: Option<String>,
    /// Resume submitted with the application.
    pub resume_url: Option<String>,
    /// Submission time.
    pub applied_at: DateTime<Utc>,
    /// Last review time.
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Reviewer.
    pub reviewed_by: Option<UserId>,
    /// Reviewer notes.
    pub review_notes: Option<String>,
}

impl Application {
    /// Records an employer decision.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidOperation`] when the application was
    /// withdrawn or when `status` is [`ApplicationStatus::Withdrawn`].
    pub fn review(
        &mut self,
        status: ApplicationStatus,
        reviewer: UserId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if status == ApplicationStatus::Withdrawn {
            return Err(AppError::InvalidOperation(
                "only the applicant can withdraw an application".into(),
            ));
        }
        if self.status == ApplicationStatus::Withdrawn {
            return Err(AppError::InvalidOperation(
                "application has been withdrawn".into(),
            ));
        }
        self.status = status;
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(now);
        if notes.is_some() {
            self.review_notes = notes;
        }
        Ok(())
    }

    /// Withdraws the application.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidOperation`] when the status is final.
    pub fn withdraw(&mut self) -> Result<(), AppError> {
        if self.status.is_final() {
            return Err(AppError::InvalidOperation(format!(
                "cannot withdraw an application that is {}",
                self.status
            )));
        }
        self.status = ApplicationStatus::Withdrawn;
        Ok(())
    }
}

/// Application joined with the job, company and applicant it refers to.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApplicationView {
    /// Row id.
    pub id: ApplicationId,
    /// Target job post.
    pub job_post_id: JobPostId,
    /// Job title.
    pub job_title: String,
    /// Company of the job post.
    pub company_id: CompanyId,
    /// Company name.
    pub company_name: String,
    /// Company logo.
    pub company_logo_url: Option<String>,
    /// Company owner.
    pub employer_id: Option<UserId>,
    /// Company owner display name.
    pub employer_name: String,
    /// Applicant profile.
    pub profile_id: ProfileId,
    /// Applicant account.
    pub applicant_user_id: UserId,
    /// Applicant name from the profile.
    pub applicant_name: String,
    /// Current status.
    pub status: ApplicationStatus,
    /// Cover letter.
    pub cover_letter: Option<String>,
    /// Resume URL.
    pub resume_url: Option<String>,
    /// Submission time.
    pub applied_at: DateTime<Utc>,
    /// Last review time.
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Reviewer notes.
    pub review_notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn application(status: ApplicationStatus) -> Application {
        Application {
            id: ApplicationId::new(1),
            job_post_id: JobPostId::new(1),
            profile_id: ProfileId::new(1),
            status,
            cover_letter: None,
            resume_url: None,
            applied_at: Utc::now(),
            reviewed_at: None,
            reviewed_by: None,
            review_notes: None,
        }
    }

    #[test]
    fn review_records_reviewer() {
        let mut app = application(ApplicationStatus::Pending);
        let now = Utc::now();
        assert!(
            app.review(ApplicationStatus::Interviewing, UserId::new(9), Some("call Monday".into()), now)
                .is_ok()
        );
        assert_eq!(app.status, ApplicationStatus::Interviewing);
        assert_eq!(app.reviewed_by, Some(UserId::new(9)));
        assert_eq!(app.review_notes.as_deref(), Some("call Monday"));
    }

    #[test]
    fn reviewer_cannot_withdraw_or_touch_withdrawn() {
        let mut app = application(ApplicationStatus::Pending);
        assert!(
            app.review(ApplicationStatus::Withdrawn, UserId::new(9), None, Utc::now())
                .is_err()
        );
        let mut app = application(ApplicationStatus::Withdrawn);
        assert!(
            app.review(ApplicationStatus::Reviewing, UserId::new(9), None, Utc::now())
                .is_err()
        );
    }

    #[test]
    fn withdraw_only_from_open_states() {
        let mut app = application(ApplicationStatus::Reviewing);
        assert!(app.withdraw().is_ok());
        assert_eq!(app.status, ApplicationStatus::Withdrawn);
        assert!(app.withdraw().is_err());
        assert!(application(ApplicationStatus::Accepted).withdraw().is_err());
    }
}
