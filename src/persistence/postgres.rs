//! PostgreSQL implementation of the persistence layer.
//!
//! Uniqueness rules live in the schema (`migrations/`): the email index,
//! `UNIQUE (employer_id, student_id)` on conversations, `UNIQUE (job_post_id,
//! profile_id)` on applications and the partial index allowing one active
//! assistant session per user. Inserts that race on those constraints use
//! `ON CONFLICT DO NOTHING` and re-read the winner.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::models::{
    ActivityLogRow, AiMessageRow, AiSessionRow, ApplicationRow, ApplicationViewRow, CompanyRequestRow,
    CompanyRow, ConversationRow, ErrorLogRow, FileRow, JobPostRow, MessageRow, ProfileRow,
    RefreshTokenRow, UserRow,
};
use super::{
    AiChatStore, ApplicationStore, ChatStore, CompanyStore, FileStore, JobListing, JobStore,
    LogStore, NewApplication, ProfileStore, Store, UserStore,
};
use crate::config::AppConfig;
use crate::domain::ai_chat::{AiMessage, AiRole, AiSession};
use crate::domain::application::{Application, ApplicationStatus, ApplicationView};
use crate::domain::chat::{self, ChatMessage, Conversation, ParticipantPair};
use crate::domain::company::{
    Company, CompanyDecision, CompanyDetails, CompanyRequest, CompanyRequestStatus,
};
use crate::domain::file::{NewFile, StoredFile};
use crate::domain::job_post::{JobPost, JobPostDraft, JobPostStatus};
use crate::domain::logs::{
    ActivityFilter, ActivityLog, ActivityStats, CountEntry, ErrorFilter, ErrorLevel, ErrorLog,
    ErrorStats, NewActivityLog, NewErrorLog, TOP_N,
};
use crate::domain::profile::{Profile, ProfileDetails};
use crate::domain::user::{NewUser, RefreshToken, User};
use crate::domain::{
    AiSessionId, ApplicationId, CompanyId, CompanyRequestId, ConversationId, FileId, JobPostId,
    Page, PageRequest, ProfileId, Role, UserId,
};
use crate::error::AppError;

const USER_COLUMNS: &str =
    "id, email, password_hash, full_name, role, is_locked, created_at, last_login_at";

const TOKEN_COLUMNS: &str = "token_hash, user_id, expires_at, created_at, created_by_ip, \
     revoked_at, revoked_by_ip, replaced_by_hash";

const COMPANY_COLUMNS: &str = "id, owner_id, name, description, industry, website, address, \
     phone, email, logo_url, is_verified, created_at, updated_at";

const REQUEST_COLUMNS: &str = "id, requester_id, name, description, industry, website, address, \
     phone, email, logo_url, status, reject_reason, reviewed_by, reviewed_at, company_id, created_at";

const JOB_SELECT: &str = "SELECT j.id, j.company_id, c.name AS company_name, \
     c.logo_url AS company_logo_url, j.created_by, j.title, j.description, j.requirements, \
     j.benefits, j.salary_min, j.salary_max, j.salary_period, j.location, j.work_type, \
     j.category, j.number_of_positions, j.application_deadline, j.status, j.view_count, \
     j.application_count, j.shifts, j.required_skills, j.created_at, j.updated_at \
     FROM job_posts j JOIN companies c ON c.id = j.company_id";

const JOB_COUNT: &str =
    "SELECT COUNT(*) FROM job_posts j JOIN companies c ON c.id = j.company_id";

const PROFILE_COLUMNS: &str = "id, user_id, full_name, phone, date_of_birth, university, major, \
     graduation_year, bio, skills, resume_url, avatar_url, created_at, updated_at";

const APPLICATION_COLUMNS: &str = "id, job_post_id, profile_id, status, cover_letter, resume_url, \
     applied_at, reviewed_at, reviewed_by, review_notes";

const APPLICATION_VIEW_SELECT: &str = "SELECT a.id, a.job_post_id, j.title AS job_title, \
     c.id AS company_id, c.name AS company_name, c.logo_url AS company_logo_url, \
     u.id AS employer_id, u.full_name AS employer_name, u.email AS employer_email, \
     p.id AS profile_id, p.user_id AS applicant_user_id, p.full_name AS applicant_name, \
     a.status, a.cover_letter, a.resume_url, a.applied_at, a.reviewed_at, a.review_notes \
     FROM applications a \
     JOIN job_posts j ON j.id = a.job_post_id \
     JOIN companies c ON c.id = j.company_id \
     JOIN profiles p ON p.id = a.profile_id \
     LEFT JOIN users u ON u.id = c.owner_id";

const FILE_COLUMNS: &str =
    "id, original_name, url, folder, size_bytes, content_type, uploaded_by, uploaded_at";

const CONVERSATION_COLUMNS: &str = "id, employer_id, student_id, job_post_id, last_message_at, \
     last_message, is_employer_typing, is_student_typing, created_at";

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_id, content, is_read, read_at, created_at";

const AI_SESSION_COLUMNS: &str = "id, user_id, title, is_active, ended_at, created_at";

const AI_MESSAGE_COLUMNS: &str = "id, session_id, role, content, token_count, created_at";

const ACTIVITY_COLUMNS: &str = "id, user_id, method, path, query, ip_address, user_agent, \
     status_code, duration_ms, timestamp";

const ERROR_COLUMNS: &str = "id, level, message, error_type, details, user_id, path, method, \
     query, ip_address, user_agent, source, timestamp";

fn db(e: sqlx::Error) -> AppError {
    AppError::Persistence(e.to_string())
}

/// Maps a unique violation to [`AppError::Conflict`], anything else to a
/// persistence error.
fn unique(e: sqlx::Error, conflict: &str) -> AppError {
    if let sqlx::Error::Database(ref err) = e
        && err.is_unique_violation()
    {
        return AppError::Conflict(conflict.to_string());
    }
    db(e)
}

fn offset(page: PageRequest) -> i64 {
    i64::try_from(page.offset()).unwrap_or(i64::MAX)
}

fn total(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// `%term%` with `LIKE` wildcards in the term escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn count_entries(rows: Vec<(String, i64)>) -> Vec<CountEntry> {
    rows.into_iter()
        .map(|(key, count)| CountEntry {
            key,
            count: total(count),
        })
        .collect()
}

fn push_job_filter(qb: &mut QueryBuilder<'_, Postgres>, listing: &JobListing) {
    match listing {
        JobListing::Company(company) => {
            qb.push(" WHERE j.company_id = ").push_bind(company.get());
        }
        JobListing::Active(search) => {
            qb.push(" WHERE j.status = ")
                .push_bind(JobPostStatus::Active.as_str());
            if let Some(term) = non_blank(search.term.as_deref()) {
                let pattern = like_pattern(term);
                qb.push(" AND (j.title ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR j.description ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR j.requirements ILIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
            if let Some(location) = non_blank(search.location.as_deref()) {
                qb.push(" AND j.location ILIKE ")
                    .push_bind(like_pattern(location));
            }
            if let Some(category) = non_blank(search.category.as_deref()) {
                qb.push(" AND LOWER(j.category) = LOWER(")
                    .push_bind(category.to_string())
                    .push(")");
            }
            if let Some(work_type) = non_blank(search.work_type.as_deref()) {
                qb.push(" AND LOWER(j.work_type) = LOWER(")
                    .push_bind(work_type.to_string())
                    .push(")");
            }
            if let Some(min) = search.salary_min {
                qb.push(" AND COALESCE(j.salary_max, j.salary_min, ")
                    .push_bind(min)
                    .push(") >= ")
                    .push_bind(min);
            }
            if let Some(max) = search.salary_max {
                qb.push(" AND COALESCE(j.salary_min, j.salary_max, ")
                    .push_bind(max)
                    .push(") <= ")
                    .push_bind(max);
            }
        }
    }
}

fn push_activity_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ActivityFilter) {
    qb.push(" WHERE TRUE");
    if let Some(user) = filter.user_id {
        qb.push(" AND user_id = ").push_bind(user.get());
    }
    if let Some(start) = filter.start {
        qb.push(" AND timestamp >= ").push_bind(start);
    }
    if let Some(end) = filter.end {
        qb.push(" AND timestamp <= ").push_bind(end);
    }
}

fn push_error_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ErrorFilter) {
    qb.push(" WHERE TRUE");
    if let Some(level) = filter.level {
        qb.push(" AND level = ").push_bind(level.as_str());
    }
    if let Some(start) = filter.start {
        qb.push(" AND timestamp >= ").push_bind(start);
    }
    if let Some(end) = filter.end {
        qb.push(" AND timestamp <= ").push_bind(end);
    }
}

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool from the configuration and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] if the database is unreachable or a
    /// migration fails.
    pub async fn connect(config: &AppConfig) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(db)?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;
        tracing::info!(
            max_connections = config.database_max_connections,
            "PostgreSQL pool ready, migrations applied"
        );
        Ok(Self::new(pool))
    }
}

impl Store for PostgresStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (email, password_hash, full_name, role) VALUES ($1, $2, $3, $4) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique(e, "email is already registered"))?;
        User::try_from(row)
    }

    async fn user(&self, id: UserId) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .map(User::try_from)
            .transpose()
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?
        .map(User::try_from)
        .transpose()
    }

    async fn users(&self, ids: &[UserId]) -> Result<Vec<User>, AppError> {
        let raw: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(raw)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?
        .into_iter()
        .map(User::try_from)
        .collect()
    }

    async fn search_users(
        &self,
        term: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<User>, AppError> {
        let pattern = non_blank(term).map(like_pattern);
        let filter = "WHERE ($1::TEXT IS NULL OR email ILIKE $1 OR full_name ILIKE $1)";
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users {filter}"))
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users {filter} \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(&pattern)
        .bind(page.limit())
        .bind(offset(page))
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        let users = rows
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(users, total(count), page))
    }

    async fn set_user_locked(&self, id: UserId, locked: bool) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE users SET is_locked = $2 WHERE id = $1")
            .bind(id.get())
            .bind(locked)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
            .bind(id.get())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        Ok(())
    }

    async fn count_users_by_role(&self) -> Result<Vec<(Role, u64)>, AppError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT role, COUNT(*) FROM users GROUP BY role",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        Ok([Role::Student, Role::Employer, Role::Admin]
            .into_iter()
            .map(|role| {
                let n = rows
                    .iter()
                    .find(|(name, _)| name.as_str() == role.as_str())
                    .map_or(0, |(_, n)| total(*n));
                (role, n)
            })
            .collect())
    }

    async fn insert_refresh_token(&self, token: RefreshToken) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO refresh_tokens (token_hash, user_id, expires_at, created_at, created_by_ip) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&token.token_hash)
        .bind(token.user_id.get())
        .bind(token.expires_at)
        .bind(token.created_at)
        .bind(&token.created_by_ip)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn refresh_token(&self, token_hash: &str) -> Result<Option<RefreshToken>, AppError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM refresh_tokens WHERE token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        Ok(row.map(RefreshToken::from))
    }

    async fn revoke_refresh_token(
        &self,
        token_hash: &str,
        at: DateTime<Utc>,
        ip: Option<String>,
        replaced_by: Option<String>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = $2, revoked_by_ip = $3, replaced_by_hash = $4 \
             WHERE token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(token_hash)
        .bind(at)
        .bind(ip)
        .bind(replaced_by)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl CompanyStore for PostgresStore {
    async fn insert_company_request(
        &self,
        requester: UserId,
        details: CompanyDetails,
    ) -> Result<CompanyRequest, AppError> {
        let row = sqlx::query_as::<_, CompanyRequestRow>(&format!(
            "INSERT INTO company_requests \
             (requester_id, name, description, industry, website, address, phone, email, logo_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(requester.get())
        .bind(&details.name)
        .bind(&details.description)
        .bind(&details.industry)
        .bind(&details.website)
        .bind(&details.address)
        .bind(&details.phone)
        .bind(&details.email)
        .bind(&details.logo_url)
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;
        CompanyRequest::try_from(row)
    }

    async fn company_request(
        &self,
        id: CompanyRequestId,
    ) -> Result<Option<CompanyRequest>, AppError> {
        sqlx::query_as::<_, CompanyRequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM company_requests WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?
        .map(CompanyRequest::try_from)
        .transpose()
    }

    async fn pending_company_requests(
        &self,
        page: PageRequest,
    ) -> Result<Page<CompanyRequest>, AppError> {
        let count = self.count_pending_company_requests().await?;
        let rows = sqlx::query_as::<_, CompanyRequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM company_requests WHERE status = $1 \
             ORDER BY created_at ASC, id ASC LIMIT $2 OFFSET $3"
        ))
        .bind(CompanyRequestStatus::Pending.as_str())
        .bind(page.limit())
        .bind(offset(page))
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        let requests = rows
            .into_iter()
            .map(CompanyRequest::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(requests, count, page))
    }

    async fn has_pending_company_request(&self, requester: UserId) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM company_requests WHERE requester_id = $1 AND status = $2)",
        )
        .bind(requester.get())
        .bind(CompanyRequestStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db)
    }

    async fn decide_company_request(
        &self,
        id: CompanyRequestId,
        reviewer: UserId,
        decision: CompanyDecision,
        at: DateTime<Utc>,
    ) -> Result<CompanyRequest, AppError> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        let row = sqlx::query_as::<_, CompanyRequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM company_requests WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db)?;
        let Some(row) = row else {
            return Err(AppError::not_found("company request"));
        };
        let request = CompanyRequest::try_from(row)?;
        if request.status != CompanyRequestStatus::Pending {
            return Err(AppError::InvalidOperation(format!(
                "company request is already {}",
                request.status
            )));
        }

        let updated = match decision {
            CompanyDecision::Approve => {
                let d = &request.details;
                let company_id: i64 = sqlx::query_scalar(
                    "INSERT INTO companies (owner_id, name, description, industry, website, \
                     address, phone, email, logo_url, is_verified, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, TRUE, $10, $10) RETURNING id",
                )
                .bind(request.requester_id.get())
                .bind(&d.name)
                .bind(&d.description)
                .bind(&d.industry)
                .bind(&d.website)
                .bind(&d.address)
                .bind(&d.phone)
                .bind(&d.email)
                .bind(&d.logo_url)
                .bind(at)
                .fetch_one(&mut *tx)
                .await
                .map_err(db)?;
                sqlx::query("UPDATE users SET role = $2 WHERE id = $1 AND role = $3")
                    .bind(request.requester_id.get())
                    .bind(Role::Employer.as_str())
                    .bind(Role::Student.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(db)?;
                sqlx::query_as::<_, CompanyRequestRow>(&format!(
                    "UPDATE company_requests SET status = $2, reviewed_by = $3, reviewed_at = $4, \
                     company_id = $5 WHERE id = $1 RETURNING {REQUEST_COLUMNS}"
                ))
                .bind(id.get())
                .bind(CompanyRequestStatus::Approved.as_str())
                .bind(reviewer.get())
                .bind(at)
                .bind(company_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(db)?
            }
            CompanyDecision::Reject(reason) => sqlx::query_as::<_, CompanyRequestRow>(&format!(
                "UPDATE company_requests SET status = $2, reviewed_by = $3, reviewed_at = $4, \
                 reject_reason = $5 WHERE id = $1 RETURNING {REQUEST_COLUMNS}"
            ))
            .bind(id.get())
            .bind(CompanyRequestStatus::Rejected.as_str())
            .bind(reviewer.get())
            .bind(at)
            .bind(reason)
            .fetch_one(&mut *tx)
            .await
            .map_err(db)?,
        };
        tx.commit().await.map_err(db)?;
        CompanyRequest::try_from(updated)
    }

    async fn company(&self, id: CompanyId) -> Result<Option<Company>, AppError> {
        let row = sqlx::query_as::<_, CompanyRow>(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        Ok(row.map(Company::from))
    }

    async fn company_by_owner(&self, owner: UserId) -> Result<Option<Company>, AppError> {
        let row = sqlx::query_as::<_, CompanyRow>(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies WHERE owner_id = $1 ORDER BY id LIMIT 1"
        ))
        .bind(owner.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        Ok(row.map(Company::from))
    }

    async fn list_companies(
        &self,
        term: Option<&str>,
        newest_first: bool,
        page: PageRequest,
    ) -> Result<Page<Company>, AppError> {
        let pattern = non_blank(term).map(like_pattern);
        let filter = "WHERE ($1::TEXT IS NULL OR name ILIKE $1 OR description ILIKE $1 \
                      OR industry ILIKE $1 OR address ILIKE $1)";
        let direction = if newest_first { "DESC" } else { "ASC" };
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM companies {filter}"))
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;
        let rows = sqlx::query_as::<_, CompanyRow>(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies {filter} \
             ORDER BY created_at {direction}, id {direction} LIMIT $2 OFFSET $3"
        ))
        .bind(&pattern)
        .bind(page.limit())
        .bind(offset(page))
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        Ok(Page::new(
            rows.into_iter().map(Company::from).collect(),
            total(count),
            page,
        ))
    }

    async fn update_company(
        &self,
        id: CompanyId,
        details: CompanyDetails,
        at: DateTime<Utc>,
    ) -> Result<Option<Company>, AppError> {
        let row = sqlx::query_as::<_, CompanyRow>(&format!(
            "UPDATE companies SET name = $2, description = $3, industry = $4, website = $5, \
             address = $6, phone = $7, email = $8, logo_url = $9, updated_at = $10 \
             WHERE id = $1 RETURNING {COMPANY_COLUMNS}"
        ))
        .bind(id.get())
        .bind(&details.name)
        .bind(&details.description)
        .bind(&details.industry)
        .bind(&details.website)
        .bind(&details.address)
        .bind(&details.phone)
        .bind(&details.email)
        .bind(&details.logo_url)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        Ok(row.map(Company::from))
    }

    async fn delete_company(&self, id: CompanyId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(db)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_companies(&self) -> Result<u64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM companies")
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;
        Ok(total(count))
    }

    async fn count_pending_company_requests(&self) -> Result<u64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM company_requests WHERE status = $1")
                .bind(CompanyRequestStatus::Pending.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(db)?;
        Ok(total(count))
    }
}

#[async_trait]
impl JobStore for PostgresStore {
    async fn insert_job_post(
        &self,
        company: CompanyId,
        created_by: UserId,
        draft: JobPostDraft,
        at: DateTime<Utc>,
    ) -> Result<JobPost, AppError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO job_posts (company_id, created_by, title, description, requirements, \
             benefits, salary_min, salary_max, salary_period, location, work_type, category, \
             number_of_positions, application_deadline, status, shifts, required_skills, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
             RETURNING id",
        )
        .bind(company.get())
        .bind(created_by.get())
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.requirements)
        .bind(&draft.benefits)
        .bind(draft.salary_min)
        .bind(draft.salary_max)
        .bind(&draft.salary_period)
        .bind(&draft.location)
        .bind(&draft.work_type)
        .bind(&draft.category)
        .bind(draft.number_of_positions.unwrap_or(1))
        .bind(draft.application_deadline)
        .bind(JobPostStatus::Active.as_str())
        .bind(Json(&draft.shifts))
        .bind(&draft.required_skills)
        .bind(at)
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;
        self.job_post(JobPostId::new(id))
            .await?
            .ok_or_else(|| AppError::not_found("job post"))
    }

    async fn job_post(&self, id: JobPostId) -> Result<Option<JobPost>, AppError> {
        sqlx::query_as::<_, JobPostRow>(&format!("{JOB_SELECT} WHERE j.id = $1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .map(JobPost::try_from)
            .transpose()
    }

    async fn view_job_post(&self, id: JobPostId) -> Result<Option<JobPost>, AppError> {
        let result = sqlx::query("UPDATE job_posts SET view_count = view_count + 1 WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(db)?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.job_post(id).await
    }

    async fn list_job_posts(
        &self,
        listing: JobListing,
        page: PageRequest,
    ) -> Result<Page<JobPost>, AppError> {
        let mut count = QueryBuilder::<Postgres>::new(JOB_COUNT);
        push_job_filter(&mut count, &listing);
        let count: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;

        let mut select = QueryBuilder::<Postgres>::new(JOB_SELECT);
        push_job_filter(&mut select, &listing);
        select
            .push(" ORDER BY j.created_at DESC, j.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(offset(page));
        let rows: Vec<JobPostRow> = select
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        let posts = rows
            .into_iter()
            .map(JobPost::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(posts, total(count), page))
    }

    async fn save_job_post(&self, post: &JobPost) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE job_posts SET title = $2, description = $3, requirements = $4, benefits = $5, \
             salary_min = $6, salary_max = $7, salary_period = $8, location = $9, work_type = $10, \
             category = $11, number_of_positions = $12, application_deadline = $13, status = $14, \
             shifts = $15, required_skills = $16, updated_at = $17 WHERE id = $1",
        )
        .bind(post.id.get())
        .bind(&post.title)
        .bind(&post.description)
        .bind(&post.requirements)
        .bind(&post.benefits)
        .bind(post.salary_min)
        .bind(post.salary_max)
        .bind(&post.salary_period)
        .bind(&post.location)
        .bind(&post.work_type)
        .bind(&post.category)
        .bind(post.number_of_positions)
        .bind(post.application_deadline)
        .bind(post.status.as_str())
        .bind(Json(&post.shifts))
        .bind(&post.required_skills)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("job post"));
        }
        Ok(())
    }

    async fn set_job_status(
        &self,
        id: JobPostId,
        status: JobPostStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE job_posts SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id.get())
            .bind(status.as_str())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_job_post(&self, id: JobPostId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM job_posts WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(db)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_job_posts(&self) -> Result<(u64, u64), AppError> {
        let (all, active): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE status = $1) FROM job_posts",
        )
        .bind(JobPostStatus::Active.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;
        Ok((total(all), total(active)))
    }
}

#[async_trait]
impl ProfileStore for PostgresStore {
    async fn upsert_profile(
        &self,
        user: UserId,
        details: ProfileDetails,
        at: DateTime<Utc>,
    ) -> Result<Profile, AppError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "INSERT INTO profiles (user_id, full_name, phone, date_of_birth, university, major, \
             graduation_year, bio, skills, resume_url, avatar_url, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (user_id) DO UPDATE SET full_name = EXCLUDED.full_name, \
             phone = EXCLUDED.phone, date_of_birth = EXCLUDED.date_of_birth, \
             university = EXCLUDED.university, major = EXCLUDED.major, \
             graduation_year = EXCLUDED.graduation_year, bio = EXCLUDED.bio, \
             skills = EXCLUDED.skills, resume_url = EXCLUDED.resume_url, \
             avatar_url = EXCLUDED.avatar_url, updated_at = EXCLUDED.created_at \
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(user.get())
        .bind(&details.full_name)
        .bind(&details.phone)
        .bind(details.date_of_birth)
        .bind(&details.university)
        .bind(&details.major)
        .bind(details.graduation_year)
        .bind(&details.bio)
        .bind(&details.skills)
        .bind(&details.resume_url)
        .bind(&details.avatar_url)
        .bind(at)
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;
        Ok(Profile::from(row))
    }

    async fn profile(&self, id: ProfileId) -> Result<Option<Profile>, AppError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        Ok(row.map(Profile::from))
    }

    async fn profile_by_user(&self, user: UserId) -> Result<Option<Profile>, AppError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = $1"
        ))
        .bind(user.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        Ok(row.map(Profile::from))
    }

    async fn delete_profile(&self, id: ProfileId) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        sqlx::query(
            "UPDATE job_posts SET application_count = GREATEST(application_count - 1, 0) \
             WHERE id IN (SELECT job_post_id FROM applications WHERE profile_id = $1)",
        )
        .bind(id.get())
        .execute(&mut *tx)
        .await
        .map_err(db)?;
        let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        tx.commit().await.map_err(db)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ApplicationStore for PostgresStore {
    async fn insert_application(&self, new: NewApplication) -> Result<Application, AppError> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "INSERT INTO applications (job_post_id, profile_id, status, cover_letter, resume_url, \
             applied_at) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {APPLICATION_COLUMNS}"
        ))
        .bind(new.job_post_id.get())
        .bind(new.profile_id.get())
        .bind(ApplicationStatus::Pending.as_str())
        .bind(&new.cover_letter)
        .bind(&new.resume_url)
        .bind(new.applied_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique(e, "you have already applied to this job post"))?;
        sqlx::query("UPDATE job_posts SET application_count = application_count + 1 WHERE id = $1")
            .bind(new.job_post_id.get())
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        tx.commit().await.map_err(db)?;
        Application::try_from(row)
    }

    async fn application(&self, id: ApplicationId) -> Result<Option<Application>, AppError> {
        sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?
        .map(Application::try_from)
        .transpose()
    }

    async fn application_view(
        &self,
        id: ApplicationId,
    ) -> Result<Option<ApplicationView>, AppError> {
        sqlx::query_as::<_, ApplicationViewRow>(&format!(
            "{APPLICATION_VIEW_SELECT} WHERE a.id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?
        .map(ApplicationView::try_from)
        .transpose()
    }

    async fn applications_for_job(
        &self,
        job: JobPostId,
        page: PageRequest,
    ) -> Result<Page<ApplicationView>, AppError> {
        self.application_views("a.job_post_id", job.get(), page)
            .await
    }

    async fn applications_for_profile(
        &self,
        profile: ProfileId,
        page: PageRequest,
    ) -> Result<Page<ApplicationView>, AppError> {
        self.application_views("a.profile_id", profile.get(), page)
            .await
    }

    async fn save_application(&self, application: &Application) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE applications SET status = $2, reviewed_at = $3, reviewed_by = $4, \
             review_notes = $5 WHERE id = $1",
        )
        .bind(application.id.get())
        .bind(application.status.as_str())
        .bind(application.reviewed_at)
        .bind(application.reviewed_by.map(UserId::get))
        .bind(&application.review_notes)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("application"));
        }
        Ok(())
    }

    async fn count_applications(&self) -> Result<u64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM applications")
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;
        Ok(total(count))
    }
}

impl PostgresStore {
    /// Applications filtered on one id column, newest first.
    async fn application_views(
        &self,
        column: &'static str,
        id: i64,
        page: PageRequest,
    ) -> Result<Page<ApplicationView>, AppError> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM applications a WHERE {column} = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;
        let rows = sqlx::query_as::<_, ApplicationViewRow>(&format!(
            "{APPLICATION_VIEW_SELECT} WHERE {column} = $1 \
             ORDER BY a.applied_at DESC, a.id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(id)
        .bind(page.limit())
        .bind(offset(page))
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        let views = rows
            .into_iter()
            .map(ApplicationView::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(views, total(count), page))
    }
}

#[async_trait]
impl FileStore for PostgresStore {
    async fn insert_file(&self, file: NewFile) -> Result<StoredFile, AppError> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "INSERT INTO files (original_name, url, folder, size_bytes, content_type, uploaded_by) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {FILE_COLUMNS}"
        ))
        .bind(&file.original_name)
        .bind(&file.url)
        .bind(file.folder.as_str())
        .bind(file.size_bytes)
        .bind(&file.content_type)
        .bind(file.uploaded_by.get())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique(e, "a file with this name already exists"))?;
        StoredFile::try_from(row)
    }

    async fn file_by_url(&self, url: &str) -> Result<Option<StoredFile>, AppError> {
        sqlx::query_as::<_, FileRow>(&format!("SELECT {FILE_COLUMNS} FROM files WHERE url = $1"))
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .map(StoredFile::try_from)
            .transpose()
    }

    async fn delete_file(&self, id: FileId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(db)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ChatStore for PostgresStore {
    async fn find_or_create_conversation(
        &self,
        pair: ParticipantPair,
        job_post: Option<JobPostId>,
        at: DateTime<Utc>,
    ) -> Result<(Conversation, bool), AppError> {
        let inserted = sqlx::query_as::<_, ConversationRow>(&format!(
            "INSERT INTO chat_conversations (employer_id, student_id, job_post_id, created_at) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (employer_id, student_id) DO NOTHING \
             RETURNING {CONVERSATION_COLUMNS}"
        ))
        .bind(pair.employer_id.get())
        .bind(pair.student_id.get())
        .bind(job_post.map(JobPostId::get))
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        if let Some(row) = inserted {
            return Ok((Conversation::from(row), true));
        }
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM chat_conversations \
             WHERE employer_id = $1 AND student_id = $2"
        ))
        .bind(pair.employer_id.get())
        .bind(pair.student_id.get())
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;
        Ok((Conversation::from(row), false))
    }

    async fn conversation(&self, id: ConversationId) -> Result<Option<Conversation>, AppError> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM chat_conversations WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        Ok(row.map(Conversation::from))
    }

    async fn conversations_for_user(
        &self,
        user: UserId,
        page: PageRequest,
    ) -> Result<Page<Conversation>, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chat_conversations WHERE employer_id = $1 OR student_id = $1",
        )
        .bind(user.get())
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;
        let rows = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM chat_conversations \
             WHERE employer_id = $1 OR student_id = $1 \
             ORDER BY COALESCE(last_message_at, created_at) DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user.get())
        .bind(page.limit())
        .bind(offset(page))
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        Ok(Page::new(
            rows.into_iter().map(Conversation::from).collect(),
            total(count),
            page,
        ))
    }

    async fn append_message(
        &self,
        conversation: ConversationId,
        sender: UserId,
        content: String,
        preview: String,
        at: DateTime<Utc>,
    ) -> Result<ChatMessage, AppError> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        let touched = sqlx::query(
            "UPDATE chat_conversations SET last_message_at = $2, last_message = $3 WHERE id = $1",
        )
        .bind(conversation.get())
        .bind(at)
        .bind(&preview)
        .execute(&mut *tx)
        .await
        .map_err(db)?;
        if touched.rows_affected() == 0 {
            return Err(AppError::not_found("conversation"));
        }
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "INSERT INTO chat_messages (conversation_id, sender_id, content, created_at) \
             VALUES ($1, $2, $3, $4) RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(conversation.get())
        .bind(sender.get())
        .bind(&content)
        .bind(at)
        .fetch_one(&mut *tx)
        .await
        .map_err(db)?;
        tx.commit().await.map_err(db)?;
        Ok(ChatMessage::from(row))
    }

    async fn messages(
        &self,
        conversation: ConversationId,
        page: PageRequest,
    ) -> Result<Page<ChatMessage>, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages WHERE conversation_id = $1")
                .bind(conversation.get())
                .fetch_one(&self.pool)
                .await
                .map_err(db)?;
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE conversation_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(conversation.get())
        .bind(page.limit())
        .bind(offset(page))
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        let mut messages: Vec<ChatMessage> = rows.into_iter().map(ChatMessage::from).collect();
        messages.reverse();
        Ok(Page::new(messages, total(count), page))
    }

    async fn mark_read(
        &self,
        conversation: ConversationId,
        reader: UserId,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE chat_messages SET is_read = TRUE, read_at = $3 \
             WHERE conversation_id = $1 AND sender_id <> $2 AND NOT is_read",
        )
        .bind(conversation.get())
        .bind(reader.get())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(result.rows_affected())
    }

    async fn set_typing(
        &self,
        conversation: ConversationId,
        user: UserId,
        is_typing: bool,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE chat_conversations SET \
             is_employer_typing = CASE WHEN employer_id = $2 THEN $3 ELSE is_employer_typing END, \
             is_student_typing = CASE WHEN student_id = $2 THEN $3 ELSE is_student_typing END \
             WHERE id = $1 AND (employer_id = $2 OR student_id = $2)",
        )
        .bind(conversation.get())
        .bind(user.get())
        .bind(is_typing)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        if result.rows_affected() > 0 {
            return Ok(());
        }
        match self.conversation(conversation).await? {
            Some(_) => Err(chat::not_a_member()),
            None => Err(AppError::not_found("conversation")),
        }
    }

    async fn unread_counts(
        &self,
        user: UserId,
        conversations: &[ConversationId],
    ) -> Result<Vec<(ConversationId, i64)>, AppError> {
        let raw: Vec<i64> = conversations.iter().map(|id| id.get()).collect();
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT conversation_id, COUNT(*) FROM chat_messages \
             WHERE conversation_id = ANY($1) AND sender_id <> $2 AND NOT is_read \
             GROUP BY conversation_id",
        )
        .bind(raw)
        .bind(user.get())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        Ok(rows
            .into_iter()
            .map(|(id, count)| (ConversationId::new(id), count))
            .collect())
    }

    async fn total_unread(&self, user: UserId) -> Result<i64, AppError> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM chat_messages m \
             JOIN chat_conversations c ON c.id = m.conversation_id \
             WHERE (c.employer_id = $1 OR c.student_id = $1) \
             AND m.sender_id <> $1 AND NOT m.is_read",
        )
        .bind(user.get())
        .fetch_one(&self.pool)
        .await
        .map_err(db)
    }
}

#[async_trait]
impl AiChatStore for PostgresStore {
    async fn active_ai_session(&self, user: UserId, title: &str) -> Result<AiSession, AppError> {
        let select = format!(
            "SELECT {AI_SESSION_COLUMNS} FROM ai_chat_sessions \
             WHERE user_id = $1 AND is_active ORDER BY id DESC LIMIT 1"
        );
        let existing = sqlx::query_as::<_, AiSessionRow>(&select)
            .bind(user.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        if let Some(row) = existing {
            return Ok(AiSession::from(row));
        }
        let inserted = sqlx::query_as::<_, AiSessionRow>(&format!(
            "INSERT INTO ai_chat_sessions (user_id, title) VALUES ($1, $2) \
             ON CONFLICT (user_id) WHERE is_active DO NOTHING RETURNING {AI_SESSION_COLUMNS}"
        ))
        .bind(user.get())
        .bind(title)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        if let Some(row) = inserted {
            return Ok(AiSession::from(row));
        }
        let row = sqlx::query_as::<_, AiSessionRow>(&select)
            .bind(user.get())
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;
        Ok(AiSession::from(row))
    }

    async fn recent_ai_messages(
        &self,
        session: AiSessionId,
        limit: usize,
    ) -> Result<Vec<AiMessage>, AppError> {
        sqlx::query_as::<_, AiMessageRow>(&format!(
            "SELECT {AI_MESSAGE_COLUMNS} FROM ai_chat_messages WHERE session_id = $1 \
             ORDER BY id DESC LIMIT $2"
        ))
        .bind(session.get())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(db)?
        .into_iter()
        .map(AiMessage::try_from)
        .collect()
    }

    async fn append_ai_message(
        &self,
        session: AiSessionId,
        role: AiRole,
        content: String,
        token_count: i32,
    ) -> Result<AiMessage, AppError> {
        let row = sqlx::query_as::<_, AiMessageRow>(&format!(
            "INSERT INTO ai_chat_messages (session_id, role, content, token_count) \
             VALUES ($1, $2, $3, $4) RETURNING {AI_MESSAGE_COLUMNS}"
        ))
        .bind(session.get())
        .bind(role.as_str())
        .bind(&content)
        .bind(token_count)
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;
        AiMessage::try_from(row)
    }

    async fn end_ai_sessions(&self, user: UserId, at: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE ai_chat_sessions SET is_active = FALSE, ended_at = $2 \
             WHERE user_id = $1 AND is_active",
        )
        .bind(user.get())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl LogStore for PostgresStore {
    async fn insert_activity_log(&self, log: NewActivityLog) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO activity_logs (user_id, method, path, query, ip_address, user_agent, \
             status_code, duration_ms, timestamp) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(log.user_id.map(UserId::get))
        .bind(&log.method)
        .bind(&log.path)
        .bind(&log.query)
        .bind(&log.ip_address)
        .bind(&log.user_agent)
        .bind(log.status_code)
        .bind(log.duration_ms)
        .bind(log.timestamp)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn insert_error_log(&self, log: NewErrorLog) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO error_logs (level, message, error_type, details, user_id, path, method, \
             query, ip_address, user_agent, source, timestamp) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(log.level.as_str())
        .bind(&log.message)
        .bind(&log.error_type)
        .bind(&log.details)
        .bind(log.user_id.map(UserId::get))
        .bind(&log.path)
        .bind(&log.method)
        .bind(&log.query)
        .bind(&log.ip_address)
        .bind(&log.user_agent)
        .bind(&log.source)
        .bind(log.timestamp)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn activity_logs(
        &self,
        filter: &ActivityFilter,
        page: PageRequest,
    ) -> Result<Page<ActivityLog>, AppError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM activity_logs");
        push_activity_filter(&mut count, filter);
        let count: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;

        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {ACTIVITY_COLUMNS} FROM activity_logs"));
        push_activity_filter(&mut select, filter);
        select
            .push(" ORDER BY timestamp DESC, id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(offset(page));
        let rows: Vec<ActivityLogRow> = select
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        Ok(Page::new(
            rows.into_iter().map(ActivityLog::from).collect(),
            total(count),
            page,
        ))
    }

    async fn error_logs(
        &self,
        filter: &ErrorFilter,
        page: PageRequest,
    ) -> Result<Page<ErrorLog>, AppError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM error_logs");
        push_error_filter(&mut count, filter);
        let count: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;

        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {ERROR_COLUMNS} FROM error_logs"));
        push_error_filter(&mut select, filter);
        select
            .push(" ORDER BY timestamp DESC, id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(offset(page));
        let rows: Vec<ErrorLogRow> = select
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        let logs = rows
            .into_iter()
            .map(ErrorLog::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(logs, total(count), page))
    }

    async fn activity_stats(&self, filter: &ActivityFilter) -> Result<ActivityStats, AppError> {
        let mut summary = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*), \
             COUNT(*) FILTER (WHERE status_code BETWEEN 200 AND 299), \
             COUNT(*) FILTER (WHERE status_code >= 400), \
             COUNT(DISTINCT user_id), \
             COUNT(*) FILTER (WHERE user_id IS NULL), \
             AVG(duration_ms)::DOUBLE PRECISION \
             FROM activity_logs",
        );
        push_activity_filter(&mut summary, filter);
        let (all, ok, failed, users, anonymous, average): (i64, i64, i64, i64, i64, Option<f64>) =
            summary
                .build_query_as()
                .fetch_one(&self.pool)
                .await
                .map_err(db)?;

        let mut paths = QueryBuilder::<Postgres>::new("SELECT path, COUNT(*) AS n FROM activity_logs");
        push_activity_filter(&mut paths, filter);
        paths
            .push(" GROUP BY path ORDER BY n DESC, path ASC LIMIT ")
            .push_bind(TOP_N as i64);
        let top: Vec<(String, i64)> = paths
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;

        Ok(ActivityStats {
            total_requests: total(all),
            successful_requests: total(ok),
            failed_requests: total(failed),
            unique_users: total(users),
            anonymous_requests: total(anonymous),
            average_duration_ms: average.unwrap_or(0.0),
            top_paths: count_entries(top),
        })
    }

    async fn error_stats(&self, filter: &ErrorFilter) -> Result<ErrorStats, AppError> {
        let mut summary = QueryBuilder::<Postgres>::new("SELECT COUNT(*), COUNT(*) FILTER (WHERE level = ");
        summary
            .push_bind(ErrorLevel::Critical.as_str())
            .push("), COUNT(*) FILTER (WHERE level = ")
            .push_bind(ErrorLevel::Error.as_str())
            .push("), COUNT(*) FILTER (WHERE level = ")
            .push_bind(ErrorLevel::Warning.as_str())
            .push(") FROM error_logs");
        push_error_filter(&mut summary, filter);
        let (all, critical, errors, warnings): (i64, i64, i64, i64) = summary
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;

        let mut by_type =
            QueryBuilder::<Postgres>::new("SELECT error_type, COUNT(*) AS n FROM error_logs");
        push_error_filter(&mut by_type, filter);
        by_type
            .push(" AND error_type IS NOT NULL GROUP BY error_type ORDER BY n DESC, error_type ASC LIMIT ")
            .push_bind(TOP_N as i64);
        let types: Vec<(String, i64)> = by_type
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;

        let mut by_path = QueryBuilder::<Postgres>::new("SELECT path, COUNT(*) AS n FROM error_logs");
        push_error_filter(&mut by_path, filter);
        by_path
            .push(" AND path IS NOT NULL GROUP BY path ORDER BY n DESC, path ASC LIMIT ")
            .push_bind(TOP_N as i64);
        let paths: Vec<(String, i64)> = by_path
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;

        Ok(ErrorStats {
            total_errors: total(all),
            critical_errors: total(critical),
            errors: total(errors),
            warnings: total(warnings),
            errors_by_type: count_entries(types),
            errors_by_path: count_entries(paths),
        })
    }

    async fn purge_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        let activity = sqlx::query("DELETE FROM activity_logs WHERE timestamp < $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        let errors = sqlx::query("DELETE FROM error_logs WHERE timestamp < $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        tx.commit().await.map_err(db)?;
        Ok(activity.rows_affected() + errors.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("rust"), "%rust%");
    }

    #[test]
    fn job_filter_binds_active_status() {
        let mut qb = QueryBuilder::<Postgres>::new(JOB_COUNT);
        push_job_filter(
            &mut qb,
            &JobListing::Active(crate::domain::job_post::JobSearch {
                term: Some("rust".into()),
                category: Some("IT".into()),
                ..Default::default()
            }),
        );
        let sql = qb.sql();
        assert!(sql.contains("j.status = $1"));
        assert!(sql.contains("j.title ILIKE $2"));
        assert!(sql.contains("LOWER(j.category) = LOWER($5)"));
    }

    #[test]
    fn activity_filter_without_bounds_matches_everything() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM activity_logs");
        push_activity_filter(&mut qb, &ActivityFilter::default());
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM activity_logs WHERE TRUE");
    }
}
