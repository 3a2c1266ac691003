//! Job post status and application DTOs.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::application::ApplicationStatus;
use crate::domain::job_post::JobPostStatus;
use crate::service::application_service::ApplicationForm;

/// Request body for job post status changes.
#[derive(Debug, Deserialize, ToSchema)]
pub struct JobStatusRequest {
    /// New status.
    pub status: JobPostStatus,
}

/// Request body for `POST /jobs/{id}/applications`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ApplyRequest {
    /// Cover letter.
    #[serde(default, alias = "coverLetter")]
    pub cover_letter: Option<String>,
    /// Resume URL; the profile's resume when absent.
    #[serde(default, alias = "resumeUrl")]
    pub resume_url: Option<String>,
}

impl From<ApplyRequest> for ApplicationForm {
    fn from(req: ApplyRequest) -> Self {
        Self {
            cover_letter: req.cover_letter,
            resume_url: req.resume_url,
        }
    }
}

/// Request body for `PATCH /applications/{id}/status`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ApplicationStatusRequest {
    /// New status; `WITHDRAWN` is reserved for the applicant.
    pub status: ApplicationStatus,
    /// Reviewer notes.
    #[serde(default, alias = "reviewNotes")]
    pub notes: Option<String>,
}
