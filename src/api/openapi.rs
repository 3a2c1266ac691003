//! OpenAPI document for the REST surface.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::dto;
use super::handlers::{
    admin, ai_chat, applications, auth, chat, companies, files, jobs, logs, profiles, system,
};
use crate::error::{ErrorBody, ErrorResponse};

/// Generated API description served at `/openapi.json`.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "jobboard-gateway", description = "Job board REST API"),
    paths(
        system::health_handler,
        auth::register,
        auth::login,
        auth::refresh,
        auth::revoke,
        auth::me,
        companies::submit_request,
        companies::pending_requests,
        companies::get_request,
        companies::approve_request,
        companies::reject_request,
        companies::list_companies,
        companies::get_company,
        companies::own_company,
        companies::update_company,
        companies::delete_company,
        jobs::search_jobs,
        jobs::get_job,
        jobs::company_jobs,
        jobs::create_job,
        jobs::update_job,
        jobs::delete_job,
        jobs::set_job_status,
        profiles::get_profile,
        profiles::own_profile,
        profiles::save_own_profile,
        profiles::delete_profile,
        applications::apply,
        applications::job_applications,
        applications::my_applications,
        applications::get_application,
        applications::update_status,
        applications::withdraw,
        files::upload,
        files::download,
        files::delete_file,
        chat::list_conversations,
        chat::start_conversation,
        chat::get_conversation,
        chat::list_messages,
        chat::send_message,
        chat::mark_as_read,
        chat::unread_count,
        ai_chat::chat,
        ai_chat::restart,
        admin::list_users,
        admin::set_user_lock,
        admin::set_job_status,
        admin::delete_job,
        admin::dashboard,
        logs::activities,
        logs::errors,
        logs::activity_stats,
        logs::error_stats,
    ),
    components(schemas(
        ErrorResponse,
        ErrorBody,
        dto::RegisterRequest,
        dto::LoginRequest,
        dto::RefreshTokenRequest,
        dto::RejectCompanyRequest,
        dto::JobStatusRequest,
        dto::ApplyRequest,
        dto::ApplicationStatusRequest,
        dto::StartConversationRequest,
        dto::AiChatRequest,
        dto::RestartResponse,
        dto::LockUserRequest,
        dto::CountResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "System", description = "Health"),
        (name = "Auth", description = "Accounts and tokens"),
        (name = "Companies", description = "Companies and registration requests"),
        (name = "Jobs", description = "Job posts"),
        (name = "Profiles", description = "Student profiles"),
        (name = "Applications", description = "Job applications"),
        (name = "Files", description = "Uploads"),
        (name = "Chat", description = "Employer and student messaging"),
        (name = "AI Assistant", description = "Conversational assistant"),
        (name = "Admin", description = "Administration"),
        (name = "Logs", description = "Activity and error logs"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` security scheme referenced by the paths.
#[derive(Debug)]
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_chat_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/chat/messages"));
        assert!(doc.paths.paths.contains_key("/health"));
        let has_bearer = doc
            .components
            .as_ref()
            .is_some_and(|c| c.security_schemes.contains_key("bearer"));
        assert!(has_bearer);
    }
}
