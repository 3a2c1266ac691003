//! Application service: applying, reviewing and withdrawing.

use std::sync::Arc;

use chrono::Utc;

use crate::auth::AuthUser;
use crate::domain::application::{Application, ApplicationStatus, ApplicationView};
use crate::domain::{ApplicationId, JobPostId, Page, PageRequest};
use crate::error::AppError;
use crate::persistence::{NewApplication, Store};
use crate::service::job_service::can_manage;

/// Fields a student submits with an application.
#[derive(Debug, Clone, Default)]
pub struct ApplicationForm {
    /// Cover letter.
    pub cover_letter: Option<String>,
    /// Resume; defaults to the profile's resume.
    pub resume_url: Option<String>,
}

/// Orchestrates the application lifecycle.
#[derive(Debug, Clone)]
pub struct ApplicationService {
    store: Arc<dyn Store>,
}

impl ApplicationService {
    /// Creates a new `ApplicationService`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Applies the caller's profile to a job post.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for unknown posts,
    /// [`AppError::InvalidOperation`] when the post is closed or the
    /// caller has no profile, and [`AppError::Conflict`] on a second
    /// application to the same post.
    pub async fn apply(
        &self,
        caller: &AuthUser,
        job_post_id: JobPostId,
        form: ApplicationForm,
    ) -> Result<ApplicationView, AppError> {
        let now = Utc::now();
        let post = self
            .store
            .job_post(job_post_id)
            .await?
            .ok_or_else(|| AppError::not_found("job post"))?;
        if !post.accepts_applications(now) {
            return Err(AppError::InvalidOperation(
                "this job post is not accepting applications".into(),
            ));
        }
        let profile = self.store.profile_by_user(caller.id).await?.ok_or_else(|| {
            AppError::InvalidOperation("create a profile before applying".into())
        })?;

        let resume_url = non_blank(form.resume_url).or_else(|| profile.details.resume_url.clone());
        let application = self
            .store
            .insert_application(NewApplication {
                job_post_id,
                profile_id: profile.id,
                cover_letter: non_blank(form.cover_letter),
                resume_url,
                applied_at: now,
            })
            .await?;
        tracing::info!(
            application_id = %application.id,
            %job_post_id,
            profile_id = %profile.id,
            "application submitted"
        );
        self.view(application.id).await
    }

    /// One application, visible to its applicant, the post's managers and
    /// administrators.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for unknown ids and
    /// [`AppError::Forbidden`] for other callers.
    pub async fn get(&self, id: ApplicationId, caller: &AuthUser) -> Result<ApplicationView, AppError> {
        let view = self.view(id).await?;
        if caller.is_admin() || view.applicant_user_id == caller.id {
            return Ok(view);
        }
        self.managed_post(view.job_post_id, caller).await?;
        Ok(view)
    }

    /// Applications to a post, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] unless the caller manages the post.
    pub async fn for_job(
        &self,
        job_post_id: JobPostId,
        caller: &AuthUser,
        page: PageRequest,
    ) -> Result<Page<ApplicationView>, AppError> {
        self.managed_post(job_post_id, caller).await?;
        self.store.applications_for_job(job_post_id, page).await
    }

    /// The caller's own applications, newest first. Empty when the caller
    /// has no profile.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn mine(
        &self,
        caller: &AuthUser,
        page: PageRequest,
    ) -> Result<Page<ApplicationView>, AppError> {
        match self.store.profile_by_user(caller.id).await? {
            Some(profile) => self.store.applications_for_profile(profile.id, page).await,
            None => Ok(Page::new(Vec::new(), 0, page)),
        }
    }

    /// Records a review decision.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] unless the caller manages the post,
    /// and [`AppError::InvalidOperation`] for withdrawn applications or a
    /// `WITHDRAWN` target status.
    pub async fn update_status(
        &self,
        id: ApplicationId,
        caller: &AuthUser,
        status: ApplicationStatus,
        notes: Option<String>,
    ) -> Result<ApplicationView, AppError> {
        let mut application = self.load(id).await?;
        self.managed_post(application.job_post_id, caller).await?;
        application.review(status, caller.id, non_blank(notes), Utc::now())?;
        self.store.save_application(&application).await?;
        tracing::info!(application_id = %id, %status, reviewer = %caller.id, "application reviewed");
        self.view(id).await
    }

    /// Withdraws the caller's application.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] for other users' applications and
    /// [`AppError::InvalidOperation`] from a final status.
    pub async fn withdraw(
        &self,
        id: ApplicationId,
        caller: &AuthUser,
    ) -> Result<ApplicationView, AppError> {
        let mut application = self.load(id).await?;
        let owner = self
            .store
            .profile(application.profile_id)
            .await?
            .map(|p| p.user_id);
        if owner != Some(caller.id) {
            return Err(AppError::forbidden("only the applicant can withdraw an application"));
        }
        application.withdraw()?;
        self.store.save_application(&application).await?;
        tracing::info!(application_id = %id, "application withdrawn");
        self.view(id).await
    }

    async fn load(&self, id: ApplicationId) -> Result<Application, AppError> {
        self.store
            .application(id)
            .await?
            .ok_or_else(|| AppError::not_found("application"))
    }

    async fn view(&self, id: ApplicationId) -> Result<ApplicationView, AppError> {
        self.store
            .application_view(id)
            .await?
            .ok_or_else(|| AppError::not_found("application"))
    }

    async fn managed_post(&self, id: JobPostId, caller: &AuthUser) -> Result<(), AppError> {
        let post = self
            .store
            .job_post(id)
            .await?
            .ok_or_else(|| AppError::not_found("job post"))?;
        if can_manage(self.store.as_ref(), &post, caller).await? {
            Ok(())
        } else {
            Err(AppError::forbidden("you do not manage this job post"))
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::domain::company::CompanyDetails;
    use crate::domain::job_post::{JobPost, JobPostDraft, JobPostStatus};
    use crate::domain::profile::ProfileDetails;
    use crate::domain::user::NewUser;
    use crate::persistence::MemoryStore;
    use crate::service::{CompanyService, JobService, ProfileService};

    struct Fixture {
        applications: ApplicationService,
        jobs: JobService,
        profiles: ProfileService,
        employer: AuthUser,
        student: AuthUser,
        outsider: AuthUser,
        post: JobPost,
    }

    async fn user(store: &Arc<dyn Store>, email: &str, role: Role) -> AuthUser {
        let Ok(user) = store
            .insert_user(NewUser {
                email: email.into(),
                password_hash: String::new(),
                full_name: Some(email.into()),
                role,
            })
            .await
        else {
            panic!("insert user failed");
        };
        AuthUser {
            id: user.id,
            email: user.email,
            role,
        }
    }

    async fn fixture() -> Fixture {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let companies = CompanyService::new(Arc::clone(&store));
        let jobs = JobService::new(Arc::clone(&store));
        let profiles = ProfileService::new(Arc::clone(&store));
        let employer = user(&store, "boss@x.io", Role::Employer).await;
        let admin = user(&store, "admin@x.io", Role::Admin).await;
        let student = user(&store, "stu@x.io", Role::Student).await;
        let outsider = user(&store, "out@x.io", Role::Employer).await;

        let details = CompanyDetails {
            name: "Acme".into(),
            ..CompanyDetails::default()
        };
        let Ok(request) = companies.submit_request(&employer, details).await else {
            panic!("submit failed");
        };
        assert!(companies.approve(request.id, &admin).await.is_ok());
        let draft = JobPostDraft {
            title: "Barista".into(),
            description: "Coffee".into(),
            ..JobPostDraft::default()
        };
        let Ok(post) = jobs.create(&employer, draft).await else {
            panic!("create post failed");
        };
        Fixture {
            applications: ApplicationService::new(Arc::clone(&store)),
            jobs,
            profiles,
            employer,
            student,
            outsider,
            post,
        }
    }

    async fn with_profile(f: &Fixture) {
        let details = ProfileDetails {
            full_name: "Stu Dent".into(),
            resume_url: Some("/uploads/cvs/cv.pdf".into()),
            ..ProfileDetails::default()
        };
        assert!(f.profiles.save_own(&f.student, details).await.is_ok());
    }

    #[tokio::test]
    async fn applying_needs_a_profile_and_happens_once() {
        let f = fixture().await;
        assert!(matches!(
            f.applications
                .apply(&f.student, f.post.id, ApplicationForm::default())
                .await,
            Err(AppError::InvalidOperation(_))
        ));
        with_profile(&f).await;

        let Ok(view) = f
            .applications
            .apply(&f.student, f.post.id, ApplicationForm::default())
            .await
        else {
            panic!("apply failed");
        };
        assert_eq!(view.status, ApplicationStatus::Pending);
        assert_eq!(view.resume_url.as_deref(), Some("/uploads/cvs/cv.pdf"));
        assert_eq!(view.job_title, "Barista");
        assert_eq!(view.company_name, "Acme");
        assert_eq!(view.applicant_name, "Stu Dent");
        assert_eq!(view.employer_id, Some(f.employer.id));

        assert!(matches!(
            f.applications
                .apply(&f.student, f.post.id, ApplicationForm::default())
                .await,
            Err(AppError::Conflict(_))
        ));

        let Ok(post) = f.jobs.view(f.post.id).await else {
            panic!("post missing");
        };
        assert_eq!(post.application_count, 1);
    }

    #[tokio::test]
    async fn closed_posts_reject_applications() {
        let f = fixture().await;
        with_profile(&f).await;
        assert!(
            f.jobs
                .set_status(f.post.id, &f.employer, JobPostStatus::Closed)
                .await
                .is_ok()
        );
        assert!(matches!(
            f.applications
                .apply(&f.student, f.post.id, ApplicationForm::default())
                .await,
            Err(AppError::InvalidOperation(_))
        ));
    }

    #[tokio::test]
    async fn review_and_withdraw_rules() {
        let f = fixture().await;
        with_profile(&f).await;
        let Ok(view) = f
            .applications
            .apply(&f.student, f.post.id, ApplicationForm::default())
            .await
        else {
            panic!("apply failed");
        };

        assert!(matches!(
            f.applications.get(view.id, &f.outsider).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(f.applications.get(view.id, &f.employer).await.is_ok());
        assert!(matches!(
            f.applications
                .update_status(view.id, &f.outsider, ApplicationStatus::Reviewing, None)
                .await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            f.applications
                .update_status(view.id, &f.employer, ApplicationStatus::Withdrawn, None)
                .await,
            Err(AppError::InvalidOperation(_))
        ));

        let Ok(reviewed) = f
            .applications
            .update_status(
                view.id,
                &f.employer,
                ApplicationStatus::Interviewing,
                Some("Call Monday".into()),
            )
            .await
        else {
            panic!("review failed");
        };
        assert_eq!(reviewed.status, ApplicationStatus::Interviewing);
        assert_eq!(reviewed.review_notes.as_deref(), Some("Call Monday"));
        assert!(reviewed.reviewed_at.is_some());

        assert!(matches!(
            f.applications.withdraw(view.id, &f.employer).await,
            Err(AppError::Forbidden(_))
        ));
        let Ok(withdrawn) = f.applications.withdraw(view.id, &f.student).await else {
            panic!("withdraw failed");
        };
        assert_eq!(withdrawn.status, ApplicationStatus::Withdrawn);
        assert!(matches!(
            f.applications
                .update_status(view.id, &f.employer, ApplicationStatus::Offered, None)
                .await,
            Err(AppError::InvalidOperation(_))
        ));

        let Ok(mine) = f.applications.mine(&f.student, PageRequest::default()).await else {
            panic!("list failed");
        };
        assert_eq!(mine.pagination.total, 1);
        let Ok(none) = f.applications.mine(&f.outsider, PageRequest::default()).await else {
            panic!("list failed");
        };
        assert!(none.data.is_empty());
    }
}
