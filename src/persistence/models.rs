//! Database rows and their conversion into domain types.
//!
//! Rows keep raw column types (`i64` ids, `TEXT` enums); the `TryFrom`
//! impls wrap ids and parse enums so a bad value in a column surfaces as a
//! persistence error instead of a panic.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use sqlx::types::Json;

use crate::domain::ai_chat::{AiMessage, AiSession};
use crate::domain::application::{Application, ApplicationView};
use crate::domain::chat::{ChatMessage, Conversation};
use crate::domain::company::{Company, CompanyDetails, CompanyRequest};
use crate::domain::file::StoredFile;
use crate::domain::job_post::{JobPost, JobShift};
use crate::domain::logs::{ActivityLog, ErrorLog};
use crate::domain::profile::{Profile, ProfileDetails};
use crate::domain::user::{RefreshToken, User};
use crate::domain::{
    AiMessageId, AiSessionId, ApplicationId, CompanyId, CompanyRequestId, ConversationId, FileId,
    JobPostId, MessageId, ProfileId, UserId,
};
use crate::error::AppError;

fn column<T: std::str::FromStr>(value: &str, name: &str) -> Result<T, AppError> {
    value
        .parse()
        .map_err(|_| AppError::Persistence(format!("unexpected {name} value: {value}")))
}

/// A row of `users`.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: String,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId::new(row.id),
            role: column(&row.role, "role")?,
            email: row.email,
            password_hash: row.password_hash,
            full_name: row.full_name,
            is_locked: row.is_locked,
            created_at: row.created_at,
            last_login_at: row.last_login_at,
        })
    }
}

/// A row of `refresh_tokens`.
#[derive(Debug, FromRow)]
pub struct RefreshTokenRow {
    pub token_hash: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub created_by_ip: Option<String>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by_ip: Option<String>,
    pub replaced_by_hash: Option<String>,
}

impl From<RefreshTokenRow> for RefreshToken {
    fn from(row: RefreshTokenRow) -> Self {
        Self {
            token_hash: row.token_hash,
            user_id: UserId::new(row.user_id),
            expires_at: row.expires_at,
            created_at: row.created_at,
            created_by_ip: row.created_by_ip,
            revoked_at: row.revoked_at,
            revoked_by_ip: row.revoked_by_ip,
            replaced_by_hash: row.replaced_by_hash,
        }
    }
}

/// Company columns shared by `companies` and `company_requests`.
#[derive(Debug, FromRow)]
pub struct DetailsColumns {
    pub name: String,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub logo_url: Option<String>,
}

impl From<DetailsColumns> for CompanyDetails {
    fn from(c: DetailsColumns) -> Self {
        Self {
            name: c.name,
            description: c.description,
            industry: c.industry,
            website: c.website,
            address: c.address,
            phone: c.phone,
            email: c.email,
            logo_url: c.logo_url,
        }
    }
}

/// A row of `companies`.
#[derive(Debug, FromRow)]
pub struct CompanyRow {
    pub id: i64,
    pub owner_id: i64,
    #[sqlx(flatten)]
    pub details: DetailsColumns,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CompanyRow> for Company {
    fn from(row: CompanyRow) -> Self {
        Self {
            id: CompanyId::new(row.id),
            owner_id: UserId::new(row.owner_id),
            details: row.details.into(),
            is_verified: row.is_verified,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A row of `company_requests`.
#[derive(Debug, FromRow)]
pub struct CompanyRequestRow {
    pub id: i64,
    pub requester_id: i64,
    #[sqlx(flatten)]
    pub details: DetailsColumns,
    pub status: String,
    pub reject_reason: Option<String>,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub company_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<CompanyRequestRow> for CompanyRequest {
    type Error = AppError;

    fn try_from(row: CompanyRequestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CompanyRequestId::new(row.id),
            requester_id: UserId::new(row.requester_id),
            details: row.details.into(),
            status: column(&row.status, "company request status")?,
            reject_reason: row.reject_reason,
            reviewed_by: row.reviewed_by.map(UserId::new),
            reviewed_at: row.reviewed_at,
            company_id: row.company_id.map(CompanyId::new),
            created_at: row.created_at,
        })
    }
}

/// A row of `job_posts` joined with its company.
#[derive(Debug, FromRow)]
pub struct JobPostRow {
    pub id: i64,
    pub company_id: i64,
    pub company_name: String,
    pub company_logo_url: Option<String>,
    pub created_by: i64,
    pub title: String,
    pub description: String,
    pub requirements: Option<String>,
    pub benefits: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_period: Option<String>,
    pub location: Option<String>,
    pub work_type: Option<String>,
    pub category: Option<String>,
    pub number_of_positions: i32,
    pub application_deadline: Option<DateTime<Utc>>,
    pub status: String,
    pub view_count: i64,
    pub application_count: i64,
    pub shifts: Json<Vec<JobShift>>,
    pub required_skills: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobPostRow> for JobPost {
    type Error = AppError;

    fn try_from(row: JobPostRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: JobPostId::new(row.id),
            company_id: CompanyId::new(row.company_id),
            status: column(&row.status, "job post status")?,
            company_name: row.company_name,
            company_logo_url: row.company_logo_url,
            created_by: UserId::new(row.created_by),
            title: row.title,
            description: row.description,
            requirements: row.requirements,
            benefits: row.benefits,
            salary_min: row.salary_min,
            salary_max: row.salary_max,
            salary_period: row.salary_period,
            location: row.location,
            work_type: row.work_type,
            category: row.category,
            number_of_positions: row.number_of_positions,
            application_deadline: row.application_deadline,
            view_count: row.view_count,
            application_count: row.application_count,
            shifts: row.shifts.0,
            required_skills: row.required_skills,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A row of `profiles`.
#[derive(Debug, FromRow)]
pub struct ProfileRow {
    pub id: i64,
    pub user_id: i64,
    pub full_name: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub university: Option<String>,
    pub major: Option<String>,
    pub graduation_year: Option<i32>,
    pub bio: Option<String>,
    pub skills: Vec<String>,
    pub resume_url: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: ProfileId::new(row.id),
            user_id: UserId::new(row.user_id),
            details: ProfileDetails {
                full_name: row.full_name,
                phone: row.phone,
                date_of_birth: row.date_of_birth,
                university: row.university,
                major: row.major,
                graduation_year: row.graduation_year,
                bio: row.bio,
                skills: row.skills,
                resume_url: row.resume_url,
                avatar_url: row.avatar_url,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A row of `applications`.
#[derive(Debug, FromRow)]
pub struct ApplicationRow {
    pub id: i64,
    pub job_post_id: i64,
    pub profile_id: i64,
    pub status: String,
    pub cover_letter: Option<String>,
    pub resume_url: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<i64>,
    pub review_notes: Option<String>,
}

impl TryFrom<ApplicationRow> for Application {
    type Error = AppError;

    fn try_from(row: ApplicationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ApplicationId::new(row.id),
            job_post_id: JobPostId::new(row.job_post_id),
            profile_id: ProfileId::new(row.profile_id),
            status: column(&row.status, "application status")?,
            cover_letter: row.cover_letter,
            resume_url: row.resume_url,
            applied_at: row.applied_at,
            reviewed_at: row.reviewed_at,
            reviewed_by: row.reviewed_by.map(UserId::new),
            review_notes: row.review_notes,
        })
    }
}

/// An application joined with its post, company, employer and applicant.
#[derive(Debug, FromRow)]
pub struct ApplicationViewRow {
    pub id: i64,
    pub job_post_id: i64,
    pub job_title: String,
    pub company_id: i64,
    pub company_name: String,
    pub company_logo_url: Option<String>,
    pub employer_id: Option<i64>,
    pub employer_name: Option<String>,
    pub employer_email: Option<String>,
    pub profile_id: i64,
    pub applicant_user_id: i64,
    pub applicant_name: String,
    pub status: String,
    pub cover_letter: Option<String>,
    pub resume_url: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
}

impl TryFrom<ApplicationViewRow> for ApplicationView {
    type Error = AppError;

    fn try_from(row: ApplicationViewRow) -> Result<Self, Self::Error> {
        let employer_name = row
            .employer_name
            .filter(|n| !n.trim().is_empty())
            .or(row.employer_email)
            .unwrap_or_default();
        Ok(Self {
            id: ApplicationId::new(row.id),
            job_post_id: JobPostId::new(row.job_post_id),
            job_title: row.job_title,
            company_id: CompanyId::new(row.company_id),
            company_name: row.company_name,
            company_logo_url: row.company_logo_url,
            employer_id: row.employer_id.map(UserId::new),
            employer_name,
            profile_id: ProfileId::new(row.profile_id),
            applicant_user_id: UserId::new(row.applicant_user_id),
            applicant_name: row.applicant_name,
            status: column(&row.status, "application status")?,
            cover_letter: row.cover_letter,
            resume_url: row.resume_url,
            applied_at: row.applied_at,
            reviewed_at: row.reviewed_at,
            review_notes: row.review_notes,
        })
    }
}

/// A row of `files`.
#[derive(Debug, FromRow)]
pub struct FileRow {
    pub id: i64,
    pub original_name: String,
    pub url: String,
    pub folder: String,
    pub size_bytes: i64,
    pub content_type: Option<String>,
    pub uploaded_by: i64,
    pub uploaded_at: DateTime<Utc>,
}

impl TryFrom<FileRow> for StoredFile {
    type Error = AppError;

    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: FileId::new(row.id),
            folder: column(&row.folder, "folder")?,
            original_name: row.original_name,
            url: row.url,
            size_bytes: row.size_bytes,
            content_type: row.content_type,
            uploaded_by: UserId::new(row.uploaded_by),
            uploaded_at: row.uploaded_at,
        })
    }
}

/// A row of `chat_conversations`.
#[derive(Debug, FromRow)]
pub struct ConversationRow {
    pub id: i64,
    pub employer_id: i64,
    pub student_id: i64,
    pub job_post_id: Option<i64>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_message: Option<String>,
    pub is_employer_typing: bool,
    pub is_student_typing: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Self {
            id: ConversationId::new(row.id),
            employer_id: UserId::new(row.employer_id),
            student_id: UserId::new(row.student_id),
            job_post_id: row.job_post_id.map(JobPostId::new),
            last_message_at: row.last_message_at,
            last_message: row.last_message,
            is_employer_typing: row.is_employer_typing,
            is_student_typing: row.is_student_typing,
            created_at: row.created_at,
        }
    }
}

/// A row of `chat_messages`.
#[derive(Debug, FromRow)]
pub struct MessageRow {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<MessageRow> for ChatMessage {
    fn from(row: MessageRow) -> Self {
        Self {
            id: MessageId::new(row.id),
            conversation_id: ConversationId::new(row.conversation_id),
            sender_id: UserId::new(row.sender_id),
            content: row.content,
            is_read: row.is_read,
            read_at: row.read_at,
            created_at: row.created_at,
        }
    }
}

/// A row of `ai_chat_sessions`.
#[derive(Debug, FromRow)]
pub struct AiSessionRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub is_active: bool,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<AiSessionRow> for AiSession {
    fn from(row: AiSessionRow) -> Self {
        Self {
            id: AiSessionId::new(row.id),
            user_id: UserId::new(row.user_id),
            title: row.title,
            is_active: row.is_active,
            ended_at: row.ended_at,
            created_at: row.created_at,
        }
    }
}

/// A row of `ai_chat_messages`.
#[derive(Debug, FromRow)]
pub struct AiMessageRow {
    pub id: i64,
    pub session_id: i64,
    pub role: String,
    pub content: String,
    pub token_count: i32,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AiMessageRow> for AiMessage {
    type Error = AppError;

    fn try_from(row: AiMessageRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: AiMessageId::new(row.id),
            session_id: AiSessionId::new(row.session_id),
            role: column(&row.role, "assistant role")?,
            content: row.content,
            token_count: row.token_count,
            created_at: row.created_at,
        })
    }
}

/// A row of `activity_logs`.
#[derive(Debug, FromRow)]
pub struct ActivityLogRow {
    pub id: i64,
    pub user_id: Option<i64>,
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub status_code: i32,
    pub duration_ms: i64,
    pub timestamp: DateTime<Utc>,
}

impl From<ActivityLogRow> for ActivityLog {
    fn from(row: ActivityLogRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id.map(UserId::new),
            method: row.method,
            path: row.path,
            query: row.query,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            status_code: row.status_code,
            duration_ms: row.duration_ms,
            timestamp: row.timestamp,
        }
    }
}

/// A row of `error_logs`.
#[derive(Debug, FromRow)]
pub struct ErrorLogRow {
    pub id: i64,
    pub level: String,
    pub message: String,
    pub error_type: Option<String>,
    pub details: Option<String>,
    pub user_id: Option<i64>,
    pub path: Option<String>,
    pub method: Option<String>,
    pub query: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub source: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TryFrom<ErrorLogRow> for ErrorLog {
    type Error = AppError;

    fn try_from(row: ErrorLogRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            level: column(&row.level, "error level")?,
            message: row.message,
            error_type: row.error_type,
            details: row.details,
            user_id: row.user_id.map(UserId::new),
            path: row.path,
            method: row.method,
            query: row.query,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            source: row.source,
            timestamp: row.timestamp,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Role;

    fn user_row(role: &str) -> UserRow {
        UserRow {
            id: 3,
            email: "a@b.c".into(),
            password_hash: "h".into(),
            full_name: None,
            role: role.into(),
            is_locked: false,
            created_at: Utc::now(),
            last_login_at: None,
        }
    }

    #[test]
    fn user_row_parses_role() {
        let Ok(user) = User::try_from(user_row("EMPLOYER")) else {
            panic!("row should convert");
        };
        assert_eq!(user.role, Role::Employer);
        assert_eq!(user.id, UserId::new(3));
    }

    #[test]
    fn unknown_column_value_is_a_persistence_error() {
        let result = User::try_from(user_row("OWNER"));
        assert!(matches!(result, Err(AppError::Persistence(_))));
    }
}
