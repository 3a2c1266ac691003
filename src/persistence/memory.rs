//! In-memory implementation of the persistence layer.
//!
//! All tables live behind one [`tokio::sync::RwLock`], so every trait method
//! is a single critical section: find-or-create, append-and-touch and the
//! cascading deletes are atomic with respect to each other.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{
    AiChatStore, ApplicationStore, ChatStore, CompanyStore, FileStore, JobListing, JobStore,
    LogStore, NewApplication, ProfileStore, Store, UserStore,
};
use crate::domain::ai_chat::{AiMessage, AiRole, AiSession};
use crate::domain::application::{Application, ApplicationStatus, ApplicationView};
use crate::domain::chat::{ChatMessage, Conversation, ParticipantPair};
use crate::domain::company::{
    Company, CompanyDecision, CompanyDetails, CompanyRequest, CompanyRequestStatus,
};
use crate::domain::file::{NewFile, StoredFile};
use crate::domain::job_post::{JobPost, JobPostDraft, JobPostStatus};
use crate::domain::logs::{
    ActivityFilter, ActivityLog, ActivityStats, ErrorFilter, ErrorLog, ErrorStats,
    NewActivityLog, NewErrorLog,
};
use crate::domain::profile::{Profile, ProfileDetails};
use crate::domain::user::{NewUser, RefreshToken, User};
use crate::domain::{
    AiMessageId, AiSessionId, ApplicationId, CompanyId, CompanyRequestId, ConversationId, FileId,
    JobPostId, MessageId, Page, PageRequest, ProfileId, Role, UserId,
};
use crate::error::AppError;

#[derive(Debug, Default)]
struct Tables {
    last_id: i64,
    users: BTreeMap<UserId, User>,
    refresh_tokens: HashMap<String, RefreshToken>,
    company_requests: BTreeMap<CompanyRequestId, CompanyRequest>,
    companies: BTreeMap<CompanyId, Company>,
    job_posts: BTreeMap<JobPostId, JobPost>,
    profiles: BTreeMap<ProfileId, Profile>,
    applications: BTreeMap<ApplicationId, Application>,
    files: BTreeMap<FileId, StoredFile>,
    conversations: BTreeMap<ConversationId, Conversation>,
    messages: BTreeMap<MessageId, ChatMessage>,
    ai_sessions: BTreeMap<AiSessionId, AiSession>,
    ai_messages: BTreeMap<AiMessageId, AiMessage>,
    activity_logs: Vec<ActivityLog>,
    error_logs: Vec<ErrorLog>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    /// Refreshes the company columns a post carries from the companies table.
    fn hydrate(&self, mut post: JobPost) -> JobPost {
        if let Some(company) = self.companies.get(&post.company_id) {
            post.company_name.clone_from(&company.details.name);
            post.company_logo_url.clone_from(&company.details.logo_url);
        }
        post
    }

    fn application_view(&self, app: &Application) -> Option<ApplicationView> {
        let post = self.job_posts.get(&app.job_post_id)?;
        let company = self.companies.get(&post.company_id)?;
        let profile = self.profiles.get(&app.profile_id)?;
        let employer = self.users.get(&company.owner_id);
        Some(ApplicationView {
            id: app.id,
            job_post_id: post.id,
            job_title: post.title.clone(),
            company_id: company.id,
            company_name: company.details.name.clone(),
            company_logo_url: company.details.logo_url.clone(),
            employer_id: employer.map(|u| u.id),
            employer_name: employer.map(User::display_name).unwrap_or_default(),
            profile_id: profile.id,
            applicant_user_id: profile.user_id,
            applicant_name: profile.details.full_name.clone(),
            status: app.status,
            cover_letter: app.cover_letter.clone(),
            resume_url: app.resume_url.clone(),
            applied_at: app.applied_at,
            reviewed_at: app.reviewed_at,
            review_notes: app.review_notes.clone(),
        })
    }

    fn applications_where(
        &self,
        page: PageRequest,
        keep: impl Fn(&Application) -> bool,
    ) -> Page<ApplicationView> {
        let mut rows: Vec<&Application> = self.applications.values().filter(|a| keep(a)).collect();
        rows.sort_by(|a, b| b.applied_at.cmp(&a.applied_at).then(b.id.cmp(&a.id)));
        let views: Vec<ApplicationView> = rows
            .into_iter()
            .filter_map(|a| self.application_view(a))
            .collect();
        page.apply(views)
    }

    fn delete_job_post(&mut self, id: JobPostId) -> bool {
        if self.job_posts.remove(&id).is_none() {
            return false;
        }
        self.applications.retain(|_, a| a.job_post_id != id);
        for conversation in self.conversations.values_mut() {
            if conversation.job_post_id == Some(id) {
                conversation.job_post_id = None;
            }
        }
        true
    }

    fn filtered_activity(&self, filter: &ActivityFilter) -> Vec<&ActivityLog> {
        let mut rows: Vec<&ActivityLog> = self
            .activity_logs
            .iter()
            .filter(|l| filter.matches(l))
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        rows
    }

    fn filtered_errors(&self, filter: &ErrorFilter) -> Vec<&ErrorLog> {
        let mut rows: Vec<&ErrorLog> = self
            .error_logs
            .iter()
            .filter(|l| filter.matches(l))
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        rows
    }
}

/// Process-local store used by tests and `STORAGE_BACKEND=memory`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut t = self.tables.write().await;
        if t.users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(AppError::Conflict("email is already registered".into()));
        }
        let id = UserId::new(t.next_id());
        let row = User {
            id,
            email: user.email,
            password_hash: user.password_hash,
            full_name: user.full_name,
            role: user.role,
            is_locked: false,
            created_at: Utc::now(),
            last_login_at: None,
        };
        t.users.insert(id, row.clone());
        Ok(row)
    }

    async fn user(&self, id: UserId) -> Result<Option<User>, AppError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let t = self.tables.read().await;
        Ok(t.users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn users(&self, ids: &[UserId]) -> Result<Vec<User>, AppError> {
        let t = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| t.users.get(id).cloned()).collect())
    }

    async fn search_users(
        &self,
        term: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<User>, AppError> {
        let t = self.tables.read().await;
        let term = term
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        let mut rows: Vec<User> = t
            .users
            .values()
            .filter(|u| {
                term.as_deref().is_none_or(|term| {
                    u.email.to_lowercase().contains(term)
                        || u.full_name
                            .as_deref()
                            .is_some_and(|n| n.to_lowercase().contains(term))
                })
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(page.apply(rows))
    }

    async fn set_user_locked(&self, id: UserId, locked: bool) -> Result<bool, AppError> {
        let mut t = self.tables.write().await;
        Ok(t.users.get_mut(&id).map(|u| u.is_locked = locked).is_some())
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut t = self.tables.write().await;
        if let Some(user) = t.users.get_mut(&id) {
            user.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn count_users_by_role(&self) -> Result<Vec<(Role, u64)>, AppError> {
        let t = self.tables.read().await;
        Ok([Role::Student, Role::Employer, Role::Admin]
            .into_iter()
            .map(|role| {
                let n = t.users.values().filter(|u| u.role == role).count() as u64;
                (role, n)
            })
            .collect())
    }

    async fn insert_refresh_token(&self, token: RefreshToken) -> Result<(), AppError> {
        let mut t = self.tables.write().await;
        t.refresh_tokens.insert(token.token_hash.clone(), token);
        Ok(())
    }

    async fn refresh_token(&self, token_hash: &str) -> Result<Option<RefreshToken>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .refresh_tokens
            .get(token_hash)
            .cloned())
    }

    async fn revoke_refresh_token(
        &self,
        token_hash: &str,
        at: DateTime<Utc>,
        ip: Option<String>,
        replaced_by: Option<String>,
    ) -> Result<bool, AppError> {
        let mut t = self.tables.write().await;
        match t.refresh_tokens.get_mut(token_hash) {
            Some(token) if token.revoked_at.is_none() => {
                token.revoked_at = Some(at);
                token.revoked_by_ip = ip;
                token.replaced_by_hash = replaced_by;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl CompanyStore for MemoryStore {
    async fn insert_company_request(
        &self,
        requester: UserId,
        details: CompanyDetails,
    ) -> Result<CompanyRequest, AppError> {
        let mut t = self.tables.write().await;
        let id = CompanyRequestId::new(t.next_id());
        let row = CompanyRequest {
            id,
            requester_id: requester,
            details,
            status: CompanyRequestStatus::Pending,
            reject_reason: None,
            reviewed_by: None,
            reviewed_at: None,
            company_id: None,
            created_at: Utc::now(),
        };
        t.company_requests.insert(id, row.clone());
        Ok(row)
    }

    async fn company_request(
        &self,
        id: CompanyRequestId,
    ) -> Result<Option<CompanyRequest>, AppError> {
        Ok(self.tables.read().await.company_requests.get(&id).cloned())
    }

    async fn pending_company_requests(
        &self,
        page: PageRequest,
    ) -> Result<Page<CompanyRequest>, AppError> {
        let t = self.tables.read().await;
        let rows: Vec<CompanyRequest> = t
            .company_requests
            .values()
            .filter(|r| r.status == CompanyRequestStatus::Pending)
            .cloned()
            .collect();
        Ok(page.apply(rows))
    }

    async fn has_pending_company_request(&self, requester: UserId) -> Result<bool, AppError> {
        let t = self.tables.read().await;
        Ok(t.company_requests
            .values()
            .any(|r| r.requester_id == requester && r.status == CompanyRequestStatus::Pending))
    }

    async fn decide_company_request(
        &self,
        id: CompanyRequestId,
        reviewer: UserId,
        decision: CompanyDecision,
        at: DateTime<Utc>,
    ) -> Result<CompanyRequest, AppError> {
        let mut t = self.tables.write().await;
        let Some(request) = t.company_requests.get(&id).cloned() else {
            return Err(AppError::not_found("company request"));
        };
        if request.status != CompanyRequestStatus::Pending {
            return Err(AppError::InvalidOperation(format!(
                "company request is already {}",
                request.status
            )));
        }
        let mut decided = request;
        decided.reviewed_by = Some(reviewer);
        decided.reviewed_at = Some(at);
        match decision {
            CompanyDecision::Approve => {
                let company_id = CompanyId::new(t.next_id());
                t.companies.insert(
                    company_id,
                    Company {
                        id: company_id,
                        owner_id: decided.requester_id,
                        details: decided.details.clone(),
                        is_verified: true,
                        created_at: at,
                        updated_at: at,
                    },
                );
                if let Some(user) = t.users.get_mut(&decided.requester_id)
                    && user.role == Role::Student
                {
                    user.role = Role::Employer;
                }
                decided.status = CompanyRequestStatus::Approved;
                decided.company_id = Some(company_id);
            }
            CompanyDecision::Reject(reason) => {
                decided.status = CompanyRequestStatus::Rejected;
                decided.reject_reason = Some(reason);
            }
        }
        t.company_requests.insert(id, decided.clone());
        Ok(decided)
    }

    async fn company(&self, id: CompanyId) -> Result<Option<Company>, AppError> {
        Ok(self.tables.read().await.companies.get(&id).cloned())
    }

    async fn company_by_owner(&self, owner: UserId) -> Result<Option<Company>, AppError> {
        let t = self.tables.read().await;
        Ok(t.companies
            .values()
            .find(|c| c.owner_id == owner)
            .cloned())
    }

    async fn list_companies(
        &self,
        term: Option<&str>,
        newest_first: bool,
        page: PageRequest,
    ) -> Result<Page<Company>, AppError> {
        let t = self.tables.read().await;
        let term = term.map(str::trim).filter(|s| !s.is_empty());
        let mut rows: Vec<Company> = t
            .companies
            .values()
            .filter(|c| term.is_none_or(|term| c.details.matches(term)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        if newest_first {
            rows.reverse();
        }
        Ok(page.apply(rows))
    }

    async fn update_company(
        &self,
        id: CompanyId,
        details: CompanyDetails,
        at: DateTime<Utc>,
    ) -> Result<Option<Company>, AppError> {
        let mut t = self.tables.write().await;
        Ok(t.companies.get_mut(&id).map(|company| {
            company.details = details;
            company.updated_at = at;
            company.clone()
        }))
    }

    async fn delete_company(&self, id: CompanyId) -> Result<bool, AppError> {
        let mut t = self.tables.write().await;
        if t.companies.remove(&id).is_none() {
            return Ok(false);
        }
        let posts: Vec<JobPostId> = t
            .job_posts
            .values()
            .filter(|p| p.company_id == id)
            .map(|p| p.id)
            .collect();
        for post in posts {
            t.delete_job_post(post);
        }
        Ok(true)
    }

    async fn count_companies(&self) -> Result<u64, AppError> {
        Ok(self.tables.read().await.companies.len() as u64)
    }

    async fn count_pending_company_requests(&self) -> Result<u64, AppError> {
        let t = self.tables.read().await;
        Ok(t.company_requests
            .values()
            .filter(|r| r.status == CompanyRequestStatus::Pending)
            .count() as u64)
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_job_post(
        &self,
        company: CompanyId,
        created_by: UserId,
        draft: JobPostDraft,
        at: DateTime<Utc>,
    ) -> Result<JobPost, AppError> {
        let mut t = self.tables.write().await;
        if !t.companies.contains_key(&company) {
            return Err(AppError::not_found("company"));
        }
        let id = JobPostId::new(t.next_id());
        let post = JobPost {
            id,
            company_id: company,
            company_name: String::new(),
            company_logo_url: None,
            created_by,
            title: draft.title,
            description: draft.description,
            requirements: draft.requirements,
            benefits: draft.benefits,
            salary_min: draft.salary_min,
            salary_max: draft.salary_max,
            salary_period: draft.salary_period,
            location: draft.location,
            work_type: draft.work_type,
            category: draft.category,
            number_of_positions: draft.number_of_positions.unwrap_or(1),
            application_deadline: draft.application_deadline,
            status: JobPostStatus::Active,
            view_count: 0,
            application_count: 0,
            shifts: draft.shifts,
            required_skills: draft.required_skills,
            created_at: at,
            updated_at: None,
        };
        t.job_posts.insert(id, post.clone());
        Ok(t.hydrate(post))
    }

    async fn job_post(&self, id: JobPostId) -> Result<Option<JobPost>, AppError> {
        let t = self.tables.read().await;
        Ok(t.job_posts.get(&id).cloned().map(|p| t.hydrate(p)))
    }

    async fn view_job_post(&self, id: JobPostId) -> Result<Option<JobPost>, AppError> {
        let mut t = self.tables.write().await;
        let Some(post) = t.job_posts.get_mut(&id) else {
            return Ok(None);
        };
        post.view_count += 1;
        let post = post.clone();
        Ok(Some(t.hydrate(post)))
    }

    async fn list_job_posts(
        &self,
        listing: JobListing,
        page: PageRequest,
    ) -> Result<Page<JobPost>, AppError> {
        let t = self.tables.read().await;
        let mut rows: Vec<JobPost> = t
            .job_posts
            .values()
            .filter(|p| match &listing {
                JobListing::Active(search) => search.matches(p),
                JobListing::Company(company) => p.company_id == *company,
            })
            .cloned()
            .map(|p| t.hydrate(p))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(page.apply(rows))
    }

    async fn save_job_post(&self, post: &JobPost) -> Result<(), AppError> {
        let mut t = self.tables.write().await;
        let Some(row) = t.job_posts.get_mut(&post.id) else {
            return Err(AppError::not_found("job post"));
        };
        let (views, applications) = (row.view_count, row.application_count);
        *row = post.clone();
        row.view_count = views;
        row.application_count = applications;
        Ok(())
    }

    async fn set_job_status(
        &self,
        id: JobPostId,
        status: JobPostStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut t = self.tables.write().await;
        Ok(t.job_posts
            .get_mut(&id)
            .map(|p| {
                p.status = status;
                p.updated_at = Some(at);
            })
            .is_some())
    }

    async fn delete_job_post(&self, id: JobPostId) -> Result<bool, AppError> {
        Ok(self.tables.write().await.delete_job_post(id))
    }

    async fn count_job_posts(&self) -> Result<(u64, u64), AppError> {
        let t = self.tables.read().await;
        let active = t
            .job_posts
            .values()
            .filter(|p| p.status == JobPostStatus::Active)
            .count() as u64;
        Ok((t.job_posts.len() as u64, active))
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn upsert_profile(
        &self,
        user: UserId,
        details: ProfileDetails,
        at: DateTime<Utc>,
    ) -> Result<Profile, AppError> {
        let mut t = self.tables.write().await;
        if let Some(existing) = t.profiles.values_mut().find(|p| p.user_id == user) {
            existing.details = details;
            existing.updated_at = Some(at);
            return Ok(existing.clone());
        }
        let id = ProfileId::new(t.next_id());
        let profile = Profile {
            id,
            user_id: user,
            details,
            created_at: at,
            updated_at: None,
        };
        t.profiles.insert(id, profile.clone());
        Ok(profile)
    }

    async fn profile(&self, id: ProfileId) -> Result<Option<Profile>, AppError> {
        Ok(self.tables.read().await.profiles.get(&id).cloned())
    }

    async fn profile_by_user(&self, user: UserId) -> Result<Option<Profile>, AppError> {
        let t = self.tables.read().await;
        Ok(t.profiles.values().find(|p| p.user_id == user).cloned())
    }

    async fn delete_profile(&self, id: ProfileId) -> Result<bool, AppError> {
        let mut t = self.tables.write().await;
        if t.profiles.remove(&id).is_none() {
            return Ok(false);
        }
        let removed: Vec<JobPostId> = t
            .applications
            .values()
            .filter(|a| a.profile_id == id)
            .map(|a| a.job_post_id)
            .collect();
        t.applications.retain(|_, a| a.profile_id != id);
        for job in removed {
            if let Some(post) = t.job_posts.get_mut(&job) {
                post.application_count = (post.application_count - 1).max(0);
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn insert_application(&self, new: NewApplication) -> Result<Application, AppError> {
        let mut t = self.tables.write().await;
        if t.applications
            .values()
            .any(|a| a.job_post_id == new.job_post_id && a.profile_id == new.profile_id)
        {
            return Err(AppError::Conflict(
                "you have already applied to this job post".into(),
            ));
        }
        let Some(post) = t.job_posts.get_mut(&new.job_post_id) else {
            return Err(AppError::not_found("job post"));
        };
        post.application_count += 1;
        let id = ApplicationId::new(t.next_id());
        let app = Application {
            id,
            job_post_id: new.job_post_id,
            profile_id: new.profile_id,
            status: ApplicationStatus::Pending,
            cover_letter: new.cover_letter,
            resume_url: new.resume_url,
            applied_at: new.applied_at,
            reviewed_at: None,
            reviewed_by: None,
            review_notes: None,
        };
        t.applications.insert(id, app.clone());
        Ok(app)
    }

    async fn application(&self, id: ApplicationId) -> Result<Option<Application>, AppError> {
        Ok(self.tables.read().await.applications.get(&id).cloned())
    }

    async fn application_view(
        &self,
        id: ApplicationId,
    ) -> Result<Option<ApplicationView>, AppError> {
        let t = self.tables.read().await;
        Ok(t.applications
            .get(&id)
            .and_then(|a| t.application_view(a)))
    }

    async fn applications_for_job(
        &self,
        job: JobPostId,
        page: PageRequest,
    ) -> Result<Page<ApplicationView>, AppError> {
        let t = self.tables.read().await;
        Ok(t.applications_where(page, |a| a.job_post_id == job))
    }

    async fn applications_for_profile(
        &self,
        profile: ProfileId,
        page: PageRequest,
    ) -> Result<Page<ApplicationView>, AppError> {
        let t = self.tables.read().await;
        Ok(t.applications_where(page, |a| a.profile_id == profile))
    }

    async fn save_application(&self, application: &Application) -> Result<(), AppError> {
        let mut t = self.tables.write().await;
        match t.applications.get_mut(&application.id) {
            Some(row) => {
                *row = application.clone();
                Ok(())
            }
            None => Err(AppError::not_found("application")),
        }
    }

    async fn count_applications(&self) -> Result<u64, AppError> {
        Ok(self.tables.read().await.applications.len() as u64)
    }
}

#[async_trait]
impl FileStore for MemoryStore {
    async fn insert_file(&self, file: NewFile) -> Result<StoredFile, AppError> {
        let mut t = self.tables.write().await;
        let id = FileId::new(t.next_id());
        let row = StoredFile {
            id,
            original_name: file.original_name,
            url: file.url,
            folder: file.folder,
            size_bytes: file.size_bytes,
            content_type: file.content_type,
            uploaded_by: file.uploaded_by,
            uploaded_at: Utc::now(),
        };
        t.files.insert(id, row.clone());
        Ok(row)
    }

    async fn file_by_url(&self, url: &str) -> Result<Option<StoredFile>, AppError> {
        let t = self.tables.read().await;
        Ok(t.files.values().find(|f| f.url == url).cloned())
    }

    async fn delete_file(&self, id: FileId) -> Result<bool, AppError> {
        Ok(self.tables.write().await.files.remove(&id).is_some())
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn find_or_create_conversation(
        &self,
        pair: ParticipantPair,
        job_post: Option<JobPostId>,
        at: DateTime<Utc>,
    ) -> Result<(Conversation, bool), AppError> {
        let mut t = self.tables.write().await;
        if let Some(existing) = t
            .conversations
            .values()
            .find(|c| c.employer_id == pair.employer_id && c.student_id == pair.student_id)
        {
            return Ok((existing.clone(), false));
        }
        let id = ConversationId::new(t.next_id());
        let conversation = Conversation {
            id,
            employer_id: pair.employer_id,
            student_id: pair.student_id,
            job_post_id: job_post,
            last_message_at: None,
            last_message: None,
            is_employer_typing: false,
            is_student_typing: false,
            created_at: at,
        };
        t.conversations.insert(id, conversation.clone());
        Ok((conversation, true))
    }

    async fn conversation(&self, id: ConversationId) -> Result<Option<Conversation>, AppError> {
        Ok(self.tables.read().await.conversations.get(&id).cloned())
    }

    async fn conversations_for_user(
        &self,
        user: UserId,
        page: PageRequest,
    ) -> Result<Page<Conversation>, AppError> {
        let t = self.tables.read().await;
        let mut rows: Vec<Conversation> = t
            .conversations
            .values()
            .filter(|c| c.has_participant(user))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.activity_at().cmp(&a.activity_at()).then(b.id.cmp(&a.id)));
        Ok(page.apply(rows))
    }

    async fn append_message(
        &self,
        conversation: ConversationId,
        sender: UserId,
        content: String,
        preview: String,
        at: DateTime<Utc>,
    ) -> Result<ChatMessage, AppError> {
        let mut t = self.tables.write().await;
        let Some(conv) = t.conversations.get_mut(&conversation) else {
            return Err(AppError::not_found("conversation"));
        };
        conv.last_message_at = Some(at);
        conv.last_message = Some(preview);
        let id = MessageId::new(t.next_id());
        let message = ChatMessage {
            id,
            conversation_id: conversation,
            sender_id: sender,
            content,
            is_read: false,
            read_at: None,
            created_at: at,
        };
        t.messages.insert(id, message.clone());
        Ok(message)
    }

    async fn messages(
        &self,
        conversation: ConversationId,
        page: PageRequest,
    ) -> Result<Page<ChatMessage>, AppError> {
        let t = self.tables.read().await;
        let mut rows: Vec<ChatMessage> = t
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let mut page = page.apply(rows);
        page.data.reverse();
        Ok(page)
    }

    async fn mark_read(
        &self,
        conversation: ConversationId,
        reader: UserId,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let mut t = self.tables.write().await;
        let mut count = 0;
        for message in t
            .messages
            .values_mut()
            .filter(|m| m.conversation_id == conversation && m.is_unread_for(reader))
        {
            message.is_read = true;
            message.read_at = Some(at);
            count += 1;
        }
        Ok(count)
    }

    async fn set_typing(
        &self,
        conversation: ConversationId,
        user: UserId,
        is_typing: bool,
    ) -> Result<(), AppError> {
        let mut t = self.tables.write().await;
        match t.conversations.get_mut(&conversation) {
            Some(conv) => conv.set_typing(user, is_typing),
            None => Err(AppError::not_found("conversation")),
        }
    }

    async fn unread_counts(
        &self,
        user: UserId,
        conversations: &[ConversationId],
    ) -> Result<Vec<(ConversationId, i64)>, AppError> {
        let t = self.tables.read().await;
        let mut counts: BTreeMap<ConversationId, i64> = BTreeMap::new();
        for m in t.messages.values() {
            if conversations.contains(&m.conversation_id) && m.is_unread_for(user) {
                *counts.entry(m.conversation_id).or_default() += 1;
            }
        }
        Ok(counts.into_iter().collect())
    }

    async fn total_unread(&self, user: UserId) -> Result<i64, AppError> {
        let t = self.tables.read().await;
        Ok(t.messages
            .values()
            .filter(|m| {
                m.is_unread_for(user)
                    && t.conversations
                        .get(&m.conversation_id)
                        .is_some_and(|c| c.has_participant(user))
            })
            .count() as i64)
    }
}

#[async_trait]
impl AiChatStore for MemoryStore {
    async fn active_ai_session(&self, user: UserId, title: &str) -> Result<AiSession, AppError> {
        let mut t = self.tables.write().await;
        if let Some(session) = t
            .ai_sessions
            .values()
            .rev()
            .find(|s| s.user_id == user && s.is_active)
        {
            return Ok(session.clone());
        }
        let id = AiSessionId::new(t.next_id());
        let session = AiSession {
            id,
            user_id: user,
            title: title.to_string(),
            is_active: true,
            ended_at: None,
            created_at: Utc::now(),
        };
        t.ai_sessions.insert(id, session.clone());
        Ok(session)
    }

    async fn recent_ai_messages(
        &self,
        session: AiSessionId,
        limit: usize,
    ) -> Result<Vec<AiMessage>, AppError> {
        let t = self.tables.read().await;
        Ok(t.ai_messages
            .values()
            .rev()
            .filter(|m| m.session_id == session)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn append_ai_message(
        &self,
        session: AiSessionId,
        role: AiRole,
        content: String,
        token_count: i32,
    ) -> Result<AiMessage, AppError> {
        let mut t = self.tables.write().await;
        if !t.ai_sessions.contains_key(&session) {
            return Err(AppError::not_found("chat session"));
        }
        let id = AiMessageId::new(t.next_id());
        let message = AiMessage {
            id,
            session_id: session,
            role,
            content,
            token_count,
            created_at: Utc::now(),
        };
        t.ai_messages.insert(id, message.clone());
        Ok(message)
    }

    async fn end_ai_sessions(&self, user: UserId, at: DateTime<Utc>) -> Result<u64, AppError> {
        let mut t = self.tables.write().await;
        let mut ended = 0;
        for session in t
            .ai_sessions
            .values_mut()
            .filter(|s| s.user_id == user && s.is_active)
        {
            session.is_active = false;
            session.ended_at = Some(at);
            ended += 1;
        }
        Ok(ended)
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn insert_activity_log(&self, log: NewActivityLog) -> Result<(), AppError> {
        let mut t = self.tables.write().await;
        let id = t.next_id();
        t.activity_logs.push(ActivityLog {
            id,
            user_id: log.user_id,
            method: log.method,
            path: log.path,
            query: log.query,
            ip_address: log.ip_address,
            user_agent: log.user_agent,
            status_code: log.status_code,
            duration_ms: log.duration_ms,
            timestamp: log.timestamp,
        });
        Ok(())
    }

    async fn insert_error_log(&self, log: NewErrorLog) -> Result<(), AppError> {
        let mut t = self.tables.write().await;
        let id = t.next_id();
        t.error_logs.push(ErrorLog {
            id,
            level: log.level,
            message: log.message,
            error_type: log.error_type,
            details: log.details,
            user_id: log.user_id,
            path: log.path,
            method: log.method,
            query: log.query,
            ip_address: log.ip_address,
            user_agent: log.user_agent,
            source: log.source,
            timestamp: log.timestamp,
        });
        Ok(())
    }

    async fn activity_logs(
        &self,
        filter: &ActivityFilter,
        page: PageRequest,
    ) -> Result<Page<ActivityLog>, AppError> {
        let t = self.tables.read().await;
        let rows: Vec<ActivityLog> = t.filtered_activity(filter).into_iter().cloned().collect();
        Ok(page.apply(rows))
    }

    async fn error_logs(
        &self,
        filter: &ErrorFilter,
        page: PageRequest,
    ) -> Result<Page<ErrorLog>, AppError> {
        let t = self.tables.read().await;
        let rows: Vec<ErrorLog> = t.filtered_errors(filter).into_iter().cloned().collect();
        Ok(page.apply(rows))
    }

    async fn activity_stats(&self, filter: &ActivityFilter) -> Result<ActivityStats, AppError> {
        let t = self.tables.read().await;
        Ok(ActivityStats::compute(t.filtered_activity(filter)))
    }

    async fn error_stats(&self, filter: &ErrorFilter) -> Result<ErrorStats, AppError> {
        let t = self.tables.read().await;
        Ok(ErrorStats::compute(t.filtered_errors(filter)))
    }

    async fn purge_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let mut t = self.tables.write().await;
        let before = t.activity_logs.len() + t.error_logs.len();
        t.activity_logs.retain(|l| l.timestamp >= cutoff);
        t.error_logs.retain(|l| l.timestamp >= cutoff);
        let after = t.activity_logs.len() + t.error_logs.len();
        Ok((before - after) as u64)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    async fn user(store: &MemoryStore, email: &str, role: Role) -> User {
        let Ok(user) = store
            .insert_user(NewUser {
                email: email.into(),
                password_hash: "hash".into(),
                full_name: None,
                role,
            })
            .await
        else {
            panic!("insert user failed");
        };
        user
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_case_insensitively() {
        let store = MemoryStore::new();
        user(&store, "a@x.io", Role::Student).await;
        let result = store
            .insert_user(NewUser {
                email: "A@X.IO".into(),
                password_hash: "hash".into(),
                full_name: None,
                role: Role::Student,
            })
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn concurrent_resolution_creates_one_conversation() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let employer = user(&store, "e@x.io", Role::Employer).await;
        let student = user(&store, "s@x.io", Role::Student).await;
        let pair = ParticipantPair {
            employer_id: employer.id,
            student_id: student.id,
        };
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .find_or_create_conversation(pair, None, Utc::now())
                    .await
            }));
        }
        let mut ids = Vec::new();
        let mut created = 0;
        for handle in handles {
            let Ok(Ok((conv, was_created))) = handle.await else {
                panic!("resolution failed");
            };
            ids.push(conv.id);
            created += usize::from(was_created);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn mark_read_only_touches_counterpart_messages() {
        let store = MemoryStore::new();
        let employer = user(&store, "e@x.io", Role::Employer).await;
        let student = user(&store, "s@x.io", Role::Student).await;
        let pair = ParticipantPair {
            employer_id: employer.id,
            student_id: student.id,
        };
        let Ok((conv, _)) = store.find_or_create_conversation(pair, None, Utc::now()).await else {
            panic!("conversation");
        };
        for (sender, text) in [(employer.id, "a"), (employer.id, "b"), (student.id, "c")] {
            let Ok(_) = store
                .append_message(conv.id, sender, text.into(), text.into(), Utc::now())
                .await
            else {
                panic!("append failed");
            };
        }
        assert_eq!(
            store.unread_counts(student.id, &[conv.id]).await.ok(),
            Some(vec![(conv.id, 2)])
        );
        assert_eq!(store.total_unread(employer.id).await.ok(), Some(1));
        assert_eq!(store.mark_read(conv.id, student.id, Utc::now()).await.ok(), Some(2));
        assert_eq!(store.mark_read(conv.id, student.id, Utc::now()).await.ok(), Some(0));
        assert_eq!(
            store.unread_counts(employer.id, &[conv.id]).await.ok(),
            Some(vec![(conv.id, 1)])
        );
        assert_eq!(
            store.unread_counts(student.id, &[conv.id]).await.ok(),
            Some(vec![])
        );
    }

    #[tokio::test]
    async fn message_page_counts_from_newest() {
        let store = MemoryStore::new();
        let employer = user(&store, "e@x.io", Role::Employer).await;
        let student = user(&store, "s@x.io", Role::Student).await;
        let pair = ParticipantPair {
            employer_id: employer.id,
            student_id: student.id,
        };
        let Ok((conv, _)) = store.find_or_create_conversation(pair, None, Utc::now()).await else {
            panic!("conversation");
        };
        let base = Utc::now();
        for i in 0..5 {
            let at = base + chrono::Duration::seconds(i);
            let text = format!("m{i}");
            let Ok(_) = store
                .append_message(conv.id, employer.id, text.clone(), text, at)
                .await
            else {
                panic!("append failed");
            };
        }
        let Ok(page) = store.messages(conv.id, PageRequest::new(1, 2)).await else {
            panic!("messages");
        };
        let texts: Vec<&str> = page.data.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(texts, vec!["m3", "m4"]);
        assert_eq!(page.pagination.total, 5);
    }

    #[tokio::test]
    async fn refresh_token_revokes_once() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let Ok(()) = store
            .insert_refresh_token(RefreshToken {
                token_hash: "h1".into(),
                user_id: UserId::new(1),
                expires_at: now + chrono::Duration::days(1),
                created_at: now,
                created_by_ip: None,
                revoked_at: None,
                revoked_by_ip: None,
                replaced_by_hash: None,
            })
            .await
        else {
            panic!("insert token");
        };
        assert_eq!(
            store
                .revoke_refresh_token("h1", now, None, Some("h2".into()))
                .await
                .ok(),
            Some(true)
        );
        assert_eq!(
            store.revoke_refresh_token("h1", now, None, None).await.ok(),
            Some(false)
        );
    }

    #[tokio::test]
    async fn purge_drops_old_rows() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for age in [0, 100] {
            let Ok(()) = store
                .insert_activity_log(NewActivityLog {
                    user_id: None,
                    method: "GET".into(),
                    path: "/".into(),
                    query: None,
                    ip_address: "unknown".into(),
                    user_agent: None,
                    status_code: 200,
                    duration_ms: 1,
                    timestamp: now - chrono::Duration::days(age),
                })
                .await
            else {
                panic!("insert log");
            };
        }
        let cutoff = now - chrono::Duration::days(90);
        assert_eq!(store.purge_logs_before(cutoff).await.ok(), Some(1));
    }
}
