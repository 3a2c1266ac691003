//! Administrator handlers: accounts, job moderation and the dashboard.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, put};
use axum::{Json, Router};

use crate::api::dto::{JobStatusRequest, LockUserRequest, PaginationParams, SearchParams};
use crate::api::extractors::{AppJson, AppPath, AppQuery};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::job_post::JobPost;
use crate::domain::user::UserView;
use crate::domain::{JobPostId, Page, Role, UserId};
use crate::error::{AppError, ErrorResponse};
use crate::service::admin_service::DashboardStats;

/// `GET /admin/users`: Search accounts.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for non-admins.
#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    tag = "Admin",
    summary = "List users",
    params(SearchParams, PaginationParams),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Users, newest first", body = Page<UserView>),
        (status = 403, description = "Admin only", body = ErrorResponse),
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    caller: AuthUser,
    AppQuery(search): AppQuery<SearchParams>,
    AppQuery(params): AppQuery<PaginationParams>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Admin])?;
    let page = state
        .admin
        .users(search.term.as_deref(), params.request())
        .await?;
    Ok(Json(page))
}

/// `PUT /admin/users/{id}/lock`: Lock or unlock an account.
///
/// # Errors
///
/// Returns [`AppError::InvalidOperation`] when an administrator locks
/// themself and [`AppError::NotFound`] for unknown users.
#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{id}/lock",
    tag = "Admin",
    summary = "Lock or unlock a user",
    params(("id" = i64, Path, description = "User id")),
    request_body = LockUserRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated account", body = UserView),
        (status = 400, description = "Cannot lock self", body = ErrorResponse),
        (status = 404, description = "Unknown user", body = ErrorResponse),
    )
)]
pub async fn set_user_lock(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<UserId>,
    AppJson(req): AppJson<LockUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Admin])?;
    Ok(Json(state.admin.set_locked(&caller, id, req.locked).await?))
}

/// `PATCH /admin/jobs/{id}/status`: Moderate a job post.
///
/// # Errors
///
/// Returns [`AppError::NotFound`] for unknown posts.
#[utoipa::path(
    patch,
    path = "/api/v1/admin/jobs/{id}/status",
    tag = "Admin",
    summary = "Set job post status",
    params(("id" = i64, Path, description = "Job post id")),
    request_body = JobStatusRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated post", body = JobPost),
        (status = 404, description = "Unknown post", body = ErrorResponse),
    )
)]
pub async fn set_job_status(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<JobPostId>,
    AppJson(req): AppJson<JobStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Admin])?;
    Ok(Json(state.jobs.set_status(id, &caller, req.status).await?))
}

/// `DELETE /admin/jobs/{id}`: Remove a job post.
///
/// # Errors
///
/// Returns [`AppError::NotFound`] for unknown posts.
#[utoipa::path(
    delete,
    path = "/api/v1/admin/jobs/{id}",
    tag = "Admin",
    summary = "Delete a job post",
    params(("id" = i64, Path, description = "Job post id")),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Unknown post", body = ErrorResponse),
    )
)]
pub async fn delete_job(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<JobPostId>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Admin])?;
    state.jobs.delete(id, &caller).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /admin/dashboard`: Platform counters.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for non-admins.
#[utoipa::path(
    get,
    path = "/api/v1/admin/dashboard",
    tag = "Admin",
    summary = "Dashboard statistics",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Counters", body = DashboardStats),
        (status = 403, description = "Admin only", body = ErrorResponse),
    )
)]
pub async fn dashboard(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Admin])?;
    Ok(Json(state.admin.dashboard().await?))
}

/// Administration routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/{id}/lock", put(set_user_lock))
        .route("/admin/jobs/{id}/status", patch(set_job_status))
        .route("/admin/jobs/{id}", delete(delete_job))
        .route("/admin/dashboard", get(dashboard))
}
