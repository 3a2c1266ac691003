//! Service layer: business logic orchestration.
//!
//! Each service owns one area of the job board and talks to the
//! [`crate::persistence::Store`]. [`ChatService`] additionally emits
//! realtime events through the [`super::domain::EventBus`].

pub mod admin_service;
pub mod ai_chat_service;
pub mod application_service;
pub mod audit_service;
pub mod auth_service;
pub mod chat_service;
pub mod company_service;
pub mod file_service;
pub mod job_service;
pub mod profile_service;

pub use admin_service::AdminService;
pub use ai_chat_service::AiChatService;
pub use application_service::ApplicationService;
pub use audit_service::AuditService;
pub use auth_service::AuthService;
pub use chat_service::ChatService;
pub use company_service::CompanyService;
pub use file_service::FileService;
pub use job_service::JobService;
pub use profile_service::ProfileService;
