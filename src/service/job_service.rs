//! Job post service.

use std::sync::Arc;

use chrono::Utc;

use crate::auth::AuthUser;
use crate::domain::job_post::{JobPost, JobPostDraft, JobPostPatch, JobPostStatus, JobSearch};
use crate::domain::{CompanyId, JobPostId, Page, PageRequest};
use crate::error::AppError;
use crate::persistence::{JobListing, Store};

/// Orchestrates job post reads and management.
#[derive(Debug, Clone)]
pub struct JobService {
    store: Arc<dyn Store>,
}

impl JobService {
    /// Creates a new `JobService`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Reads a post and counts the view.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for unknown ids.
    pub async fn view(&self, id: JobPostId) -> Result<JobPost, AppError> {
        self.store
            .view_job_post(id)
            .await?
            .ok_or_else(|| AppError::not_found("job post"))
    }

    /// Active posts matching `search`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] for an inverted salary range.
    pub async fn search(
        &self,
        search: JobSearch,
        page: PageRequest,
    ) -> Result<Page<JobPost>, AppError> {
        if let (Some(min), Some(max)) = (search.salary_min, search.salary_max)
            && min > max
        {
            return Err(AppError::invalid("minimum salary must not exceed maximum salary"));
        }
        self.store.list_job_posts(JobListing::Active(search), page).await
    }

    /// Every post of a company, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for unknown companies.
    pub async fn by_company(
        &self,
        company: CompanyId,
        page: PageRequest,
    ) -> Result<Page<JobPost>, AppError> {
        if self.store.company(company).await?.is_none() {
            return Err(AppError::not_found("company"));
        }
        self.store.list_job_posts(JobListing::Company(company), page).await
    }

    /// Publishes a post for the caller's company.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidOperation`] when the caller owns no
    /// company and [`AppError::InvalidRequest`] for an invalid draft.
    pub async fn create(&self, caller: &AuthUser, draft: JobPostDraft) -> Result<JobPost, AppError> {
        let now = Utc::now();
        let draft = draft.validated(now)?;
        let company = self.store.company_by_owner(caller.id).await?.ok_or_else(|| {
            AppError::InvalidOperation("you must own a company to publish job posts".into())
        })?;
        let post = self
            .store
            .insert_job_post(company.id, caller.id, draft, now)
            .await?;
        tracing::info!(job_post_id = %post.id, company_id = %company.id, "job post created");
        Ok(post)
    }

    /// Applies a partial update.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] unless the caller manages the post.
    pub async fn update(
        &self,
        id: JobPostId,
        caller: &AuthUser,
        patch: JobPostPatch,
    ) -> Result<JobPost, AppError> {
        let mut post = self.managed(id, caller).await?;
        post.apply(patch, Utc::now())?;
        self.store.save_job_post(&post).await?;
        tracing::info!(job_post_id = %id, by = %caller.id, "job post updated");
        self.get(id).await
    }

    /// Deletes a post with its applications.
    ///
    /// # Errors
    ///
    /// As [`Self::update`].
    pub async fn delete(&self, id: JobPostId, caller: &AuthUser) -> Result<(), AppError> {
        self.managed(id, caller).await?;
        if !self.store.delete_job_post(id).await? {
            return Err(AppError::not_found("job post"));
        }
        tracing::info!(job_post_id = %id, by = %caller.id, "job post deleted");
        Ok(())
    }

    /// Moves a post to `status`.
    ///
    /// # Errors
    ///
    /// As [`Self::update`].
    pub async fn set_status(
        &self,
        id: JobPostId,
        caller: &AuthUser,
        status: JobPostStatus,
    ) -> Result<JobPost, AppError> {
        self.managed(id, caller).await?;
        if !self.store.set_job_status(id, status, Utc::now()).await? {
            return Err(AppError::not_found("job post"));
        }
        tracing::info!(job_post_id = %id, %status, by = %caller.id, "job post status changed");
        self.get(id).await
    }

    async fn get(&self, id: JobPostId) -> Result<JobPost, AppError> {
        self.store
            .job_post(id)
            .await?
            .ok_or_else(|| AppError::not_found("job post"))
    }

    async fn managed(&self, id: JobPostId, caller: &AuthUser) -> Result<JobPost, AppError> {
        let post = self.get(id).await?;
        if can_manage(self.store.as_ref(), &post, caller).await? {
            Ok(post)
        } else {
            Err(AppError::forbidden("you do not manage this job post"))
        }
    }
}

/// A post is managed by its creator, the owner of its company, and
/// administrators.
///
/// # Errors
///
/// Propagates store failures.
pub async fn can_manage(store: &dyn Store, post: &JobPost, caller: &AuthUser) -> Result<bool, AppError> {
    if caller.is_admin() || post.created_by == caller.id {
        return Ok(true);
    }
    Ok(store
        .company(post.company_id)
        .await?
        .is_some_and(|c| c.owner_id == caller.id))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::domain::company::CompanyDetails;
    use crate::domain::user::NewUser;
    use crate::persistence::MemoryStore;
    use crate::service::CompanyService;

    struct Fixture {
        store: Arc<dyn Store>,
        jobs: JobService,
        employer: AuthUser,
        admin: AuthUser,
    }

    async fn user(store: &Arc<dyn Store>, email: &str, role: Role) -> AuthUser {
        let Ok(user) = store
            .insert_user(NewUser {
                email: email.into(),
                password_hash: String::new(),
                full_name: None,
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
        let employer = user(&store, "boss@x.io", Role::Employer).await;
        let admin = user(&store, "admin@x.io", Role::Admin).await;
        let details = CompanyDetails {
            name: "Acme".into(),
            ..CompanyDetails::default()
        };
        let Ok(request) = companies.submit_request(&employer, details).await else {
            panic!("submit failed");
        };
        assert!(companies.approve(request.id, &admin).await.is_ok());
        Fixture {
            jobs: JobService::new(Arc::clone(&store)),
            store,
            employer,
            admin,
        }
    }

    fn draft(title: &str) -> JobPostDraft {
        JobPostDraft {
            title: title.into(),
            description: "Serve coffee".into(),
            location: Some("Hanoi".into()),
            salary_min: Some(20.0),
            salary_max: Some(30.0),
            ..JobPostDraft::default()
        }
    }

    #[tokio::test]
    async fn new_posts_are_active_and_counted() {
        let f = fixture().await;
        let Ok(post) = f.jobs.create(&f.employer, draft("Barista")).await else {
            panic!("create failed");
        };
        assert_eq!(post.status, JobPostStatus::Active);
        assert_eq!(post.view_count, 0);
        assert_eq!(post.application_count, 0);
        assert_eq!(post.company_name, "Acme");

        let Ok(viewed) = f.jobs.view(post.id).await else {
            panic!("view failed");
        };
        assert_eq!(viewed.view_count, 1);
    }

    #[tokio::test]
    async fn posting_requires_a_company() {
        let f = fixture().await;
        let stranger = user(&f.store, "e2@x.io", Role::Employer).await;
        assert!(matches!(
            f.jobs.create(&stranger, draft("Barista")).await,
            Err(AppError::InvalidOperation(_))
        ));
    }

    #[tokio::test]
    async fn only_managers_change_posts() {
        let f = fixture().await;
        let stranger = user(&f.store, "e2@x.io", Role::Employer).await;
        let Ok(post) = f.jobs.create(&f.employer, draft("Barista")).await else {
            panic!("create failed");
        };
        let patch = JobPostPatch {
            title: Some("Head barista".into()),
            ..JobPostPatch::default()
        };
        assert!(matches!(
            f.jobs.update(post.id, &stranger, patch.clone()).await,
            Err(AppError::Forbidden(_))
        ));
        let Ok(updated) = f.jobs.update(post.id, &f.employer, patch).await else {
            panic!("update failed");
        };
        assert_eq!(updated.title, "Head barista");
        assert!(updated.updated_at.is_some());

        let Ok(paused) = f.jobs.set_status(post.id, &f.admin, JobPostStatus::Paused).await else {
            panic!("status change failed");
        };
        assert_eq!(paused.status, JobPostStatus::Paused);

        let Ok(listed) = f.jobs.search(JobSearch::default(), PageRequest::default()).await else {
            panic!("search failed");
        };
        assert!(listed.data.is_empty());
        let Ok(by_company) = f.jobs.by_company(post.company_id, PageRequest::default()).await
        else {
            panic!("list failed");
        };
        assert_eq!(by_company.data.len(), 1);

        assert!(f.jobs.delete(post.id, &f.employer).await.is_ok());
        assert!(matches!(f.jobs.view(post.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn search_filters_active_posts() {
        let f = fixture().await;
        assert!(f.jobs.create(&f.employer, draft("Barista")).await.is_ok());
        assert!(f.jobs.create(&f.employer, draft("Cashier")).await.is_ok());
        let search = JobSearch {
            term: Some("barista".into()),
            ..JobSearch::default()
        };
        let Ok(found) = f.jobs.search(search, PageRequest::default()).await else {
            panic!("search failed");
        };
        assert_eq!(found.data.len(), 1);

        let inverted = JobSearch {
            salary_min: Some(50.0),
            salary_max: Some(10.0),
            ..JobSearch::default()
        };
        assert!(f.jobs.search(inverted, PageRequest::default()).await.is_err());
    }
}
