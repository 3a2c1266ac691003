//! Persistence layer: repository traits and their two backends.
//!
//! Each aggregate has its own repository trait; [`Store`] bundles them so
//! services can hold a single `Arc<dyn Store>`. [`postgres::PostgresStore`]
//! is the production backend, [`memory::MemoryStore`] backs tests and
//! `STORAGE_BACKEND=memory` runs. Both honour the same rules: unique emails,
//! one conversation per `(employer, student)` pair, one application per
//! `(job post, profile)`, and cascading deletes.

pub mod memory;
mod models;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ai_chat::{AiMessage, AiRole, AiSession};
use crate::domain::application::{Application, ApplicationView};
use crate::domain::chat::{ChatMessage, Conversation, ParticipantPair};
use crate::domain::company::{Company, CompanyDecision, CompanyDetails, CompanyRequest};
use crate::domain::file::{NewFile, StoredFile};
use crate::domain::job_post::{JobPost, JobPostDraft, JobPostStatus, JobSearch};
use crate::domain::logs::{
    ActivityFilter, ActivityLog, ActivityStats, ErrorFilter, ErrorLog, ErrorStats,
    NewActivityLog, NewErrorLog,
};
use crate::domain::profile::{Profile, ProfileDetails};
use crate::domain::user::{NewUser, RefreshToken, User};
use crate::domain::{
    AiSessionId, ApplicationId, CompanyId, CompanyRequestId, ConversationId, FileId, JobPostId,
    Page, PageRequest, ProfileId, Role, UserId,
};
use crate::error::AppError;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Accounts and refresh tokens.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user; a duplicate email is a [`AppError::Conflict`].
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError>;
    /// Loads a user by id.
    async fn user(&self, id: UserId) -> Result<Option<User>, AppError>;
    /// Loads a user by lower-cased email.
    async fn user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    /// Loads several users; unknown ids are skipped.
    async fn users(&self, ids: &[UserId]) -> Result<Vec<User>, AppError>;
    /// Lists users, optionally filtered by email or name, newest first.
    async fn search_users(
        &self,
        term: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<User>, AppError>;
    /// Sets the lock flag. Returns `false` for an unknown user.
    async fn set_user_locked(&self, id: UserId, locked: bool) -> Result<bool, AppError>;
    /// Records a successful login.
    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), AppError>;
    /// Number of users per role.
    async fn count_users_by_role(&self) -> Result<Vec<(Role, u64)>, AppError>;

    /// Stores a new refresh token.
    async fn insert_refresh_token(&self, token: RefreshToken) -> Result<(), AppError>;
    /// Loads a refresh token by digest.
    async fn refresh_token(&self, token_hash: &str) -> Result<Option<RefreshToken>, AppError>;
    /// Revokes a token that is not yet revoked. Returns `false` if it was
    /// already revoked or does not exist, so a token can be rotated once.
    async fn revoke_refresh_token(
        &self,
        token_hash: &str,
        at: DateTime<Utc>,
        ip: Option<String>,
        replaced_by: Option<String>,
    ) -> Result<bool, AppError>;
}

/// Companies and registration requests.
#[async_trait]
pub trait CompanyStore: Send + Sync {
    /// Stores a pending registration request.
    async fn insert_company_request(
        &self,
        requester: UserId,
        details: CompanyDetails,
    ) -> Result<CompanyRequest, AppError>;
    /// Loads a request.
    async fn company_request(
        &self,
        id: CompanyRequestId,
    ) -> Result<Option<CompanyRequest>, AppError>;
    /// Pending requests, oldest first.
    async fn pending_company_requests(
        &self,
        page: PageRequest,
    ) -> Result<Page<CompanyRequest>, AppError>;
    /// Whether the user has a request awaiting review.
    async fn has_pending_company_request(&self, requester: UserId) -> Result<bool, AppError>;
    /// Decides a pending request. Approval creates the company owned by the
    /// requester and promotes a student requester to employer.
    ///
    /// Returns [`AppError::InvalidOperation`] if the request is not pending.
    async fn decide_company_request(
        &self,
        id: CompanyRequestId,
        reviewer: UserId,
        decision: CompanyDecision,
        at: DateTime<Utc>,
    ) -> Result<CompanyRequest, AppError>;
    /// Loads a company.
    async fn company(&self, id: CompanyId) -> Result<Option<Company>, AppError>;
    /// Loads the company owned by a user.
    async fn company_by_owner(&self, owner: UserId) -> Result<Option<Company>, AppError>;
    /// Lists companies matching `term` ordered by creation time.
    async fn list_companies(
        &self,
        term: Option<&str>,
        newest_first: bool,
        page: PageRequest,
    ) -> Result<Page<Company>, AppError>;
    /// Replaces the editable fields.
    async fn update_company(
        &self,
        id: CompanyId,
        details: CompanyDetails,
        at: DateTime<Utc>,
    ) -> Result<Option<Company>, AppError>;
    /// Deletes a company with its job posts and their applications.
    async fn delete_company(&self, id: CompanyId) -> Result<bool, AppError>;
    /// Total number of companies.
    async fn count_companies(&self) -> Result<u64, AppError>;
    /// Number of pending requests.
    async fn count_pending_company_requests(&self) -> Result<u64, AppError>;
}

/// Which job posts a listing covers.
#[derive(Debug, Clone)]
pub enum JobListing {
    /// Active posts matching a search, newest first.
    Active(JobSearch),
    /// Every post of a company regardless of status, newest first.
    Company(CompanyId),
}

/// Job posts.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Stores a validated draft as an active post.
    async fn insert_job_post(
        &self,
        company: CompanyId,
        created_by: UserId,
        draft: JobPostDraft,
        at: DateTime<Utc>,
    ) -> Result<JobPost, AppError>;
    /// Loads a post without side effects.
    async fn job_post(&self, id: JobPostId) -> Result<Option<JobPost>, AppError>;
    /// Increments the view counter and returns the updated post.
    async fn view_job_post(&self, id: JobPostId) -> Result<Option<JobPost>, AppError>;
    /// Lists posts.
    async fn list_job_posts(
        &self,
        listing: JobListing,
        page: PageRequest,
    ) -> Result<Page<JobPost>, AppError>;
    /// Persists the editable fields of a post.
    async fn save_job_post(&self, post: &JobPost) -> Result<(), AppError>;
    /// Changes the status. Returns `false` for an unknown post.
    async fn set_job_status(
        &self,
        id: JobPostId,
        status: JobPostStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError>;
    /// Deletes a post and its applications; conversations lose the link.
    async fn delete_job_post(&self, id: JobPostId) -> Result<bool, AppError>;
    /// `(total, active)` post counts.
    async fn count_job_posts(&self) -> Result<(u64, u64), AppError>;
}

/// Student profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Creates or replaces the user's profile.
    async fn upsert_profile(
        &self,
        user: UserId,
        details: ProfileDetails,
        at: DateTime<Utc>,
    ) -> Result<Profile, AppError>;
    /// Loads a profile.
    async fn profile(&self, id: ProfileId) -> Result<Option<Profile>, AppError>;
    /// Loads the user's profile.
    async fn profile_by_user(&self, user: UserId) -> Result<Option<Profile>, AppError>;
    /// Deletes a profile and its applications.
    async fn delete_profile(&self, id: ProfileId) -> Result<bool, AppError>;
}

/// Fields needed to insert an application.
#[derive(Debug, Clone)]
pub struct NewApplication {
    /// Target post.
    pub job_post_id: JobPostId,
    /// Applicant profile.
    pub profile_id: ProfileId,
    /// Cover letter.
    pub cover_letter: Option<String>,
    /// Resume URL.
    pub resume_url: Option<String>,
    /// Submission time.
    pub applied_at: DateTime<Utc>,
}

/// Job applications.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Inserts an application and bumps the post's application count.
    /// A second application for the same post and profile is a
    /// [`AppError::Conflict`].
    async fn insert_application(&self, new: NewApplication) -> Result<Application, AppError>;
    /// Loads an application.
    async fn application(&self, id: ApplicationId) -> Result<Option<Application>, AppError>;
    /// Loads an application joined with its post, company and applicant.
    async fn application_view(
        &self,
        id: ApplicationId,
    ) -> Result<Option<ApplicationView>, AppError>;
    /// Applications to a post, newest first.
    async fn applications_for_job(
        &self,
        job: JobPostId,
        page: PageRequest,
    ) -> Result<Page<ApplicationView>, AppError>;
    /// Applications by a profile, newest first.
    async fn applications_for_profile(
        &self,
        profile: ProfileId,
        page: PageRequest,
    ) -> Result<Page<ApplicationView>, AppError>;
    /// Persists status and review fields.
    async fn save_application(&self, application: &Application) -> Result<(), AppError>;
    /// Total number of applications.
    async fn count_applications(&self) -> Result<u64, AppError>;
}

/// Uploaded file metadata.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Stores metadata for a file written to disk.
    async fn insert_file(&self, file: NewFile) -> Result<StoredFile, AppError>;
    /// Loads metadata by public URL.
    async fn file_by_url(&self, url: &str) -> Result<Option<StoredFile>, AppError>;
    /// Deletes metadata.
    async fn delete_file(&self, id: FileId) -> Result<bool, AppError>;
}

/// Conversations and messages.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Returns the pair's conversation, creating it with `job_post` when it
    /// does not exist. Concurrent calls for one pair yield one row. The
    /// flag is `true` when this call created it.
    async fn find_or_create_conversation(
        &self,
        pair: ParticipantPair,
        job_post: Option<JobPostId>,
        at: DateTime<Utc>,
    ) -> Result<(Conversation, bool), AppError>;
    /// Loads a conversation.
    async fn conversation(&self, id: ConversationId) -> Result<Option<Conversation>, AppError>;
    /// The user's conversations by latest activity, newest first.
    async fn conversations_for_user(
        &self,
        user: UserId,
        page: PageRequest,
    ) -> Result<Page<Conversation>, AppError>;
    /// Appends a message and updates the conversation's last-message fields.
    async fn append_message(
        &self,
        conversation: ConversationId,
        sender: UserId,
        content: String,
        preview: String,
        at: DateTime<Utc>,
    ) -> Result<ChatMessage, AppError>;
    /// A page counted from the newest message, returned oldest first.
    async fn messages(
        &self,
        conversation: ConversationId,
        page: PageRequest,
    ) -> Result<Page<ChatMessage>, AppError>;
    /// Marks every message unread by `reader` as read. Returns the count.
    async fn mark_read(
        &self,
        conversation: ConversationId,
        reader: UserId,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError>;
    /// Stores a participant's typing flag.
    async fn set_typing(
        &self,
        conversation: ConversationId,
        user: UserId,
        is_typing: bool,
    ) -> Result<(), AppError>;
    /// Unread messages for `user` in each of `conversations`, in one
    /// query. Conversations without unread messages are omitted.
    async fn unread_counts(
        &self,
        user: UserId,
        conversations: &[ConversationId],
    ) -> Result<Vec<(ConversationId, i64)>, AppError>;
    /// Unread messages for `user` across all conversations.
    async fn total_unread(&self, user: UserId) -> Result<i64, AppError>;
}

/// AI assistant sessions.
#[async_trait]
pub trait AiChatStore: Send + Sync {
    /// The user's active session, created with `title` if none exists.
    async fn active_ai_session(&self, user: UserId, title: &str) -> Result<AiSession, AppError>;
    /// Newest-first messages of a session.
    async fn recent_ai_messages(
        &self,
        session: AiSessionId,
        limit: usize,
    ) -> Result<Vec<AiMessage>, AppError>;
    /// Appends a turn.
    async fn append_ai_message(
        &self,
        session: AiSessionId,
        role: AiRole,
        content: String,
        token_count: i32,
    ) -> Result<AiMessage, AppError>;
    /// Ends all active sessions of the user. Returns the count.
    async fn end_ai_sessions(&self, user: UserId, at: DateTime<Utc>) -> Result<u64, AppError>;
}

/// Activity and error logs.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Appends an activity row.
    async fn insert_activity_log(&self, log: NewActivityLog) -> Result<(), AppError>;
    /// Appends an error row.
    async fn insert_error_log(&self, log: NewErrorLog) -> Result<(), AppError>;
    /// Filtered activity rows, newest first.
    async fn activity_logs(
        &self,
        filter: &ActivityFilter,
        page: PageRequest,
    ) -> Result<Page<ActivityLog>, AppError>;
    /// Filtered error rows, newest first.
    async fn error_logs(
        &self,
        filter: &ErrorFilter,
        page: PageRequest,
    ) -> Result<Page<ErrorLog>, AppError>;
    /// Aggregates over filtered activity rows.
    async fn activity_stats(&self, filter: &ActivityFilter) -> Result<ActivityStats, AppError>;
    /// Aggregates over filtered error rows.
    async fn error_stats(&self, filter: &ErrorFilter) -> Result<ErrorStats, AppError>;
    /// Deletes activity and error rows older than `cutoff`.
    async fn purge_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;
}

/// Every repository behind one object.
pub trait Store:
    UserStore
    + CompanyStore
    + JobStore
    + ProfileStore
    + ApplicationStore
    + FileStore
    + ChatStore
    + AiChatStore
    + LogStore
    + std::fmt::Debug
{
    /// Backend name reported by the health endpoint.
    fn backend_name(&self) -> &'static str;
}
