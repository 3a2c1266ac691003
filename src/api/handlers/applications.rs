//! Application handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};

use crate::api::dto::{ApplicationStatusRequest, ApplyRequest, PaginationParams};
use crate::api::extractors::{AppJson, AppPath, AppQuery};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::application::ApplicationView;
use crate::domain::{ApplicationId, JobPostId, Page, Role};
use crate::error::{AppError, ErrorResponse};

/// `POST /jobs/{id}/applications`: Apply to a job post.
///
/// # Errors
///
/// Returns [`AppError::InvalidOperation`] when the post is closed or the
/// caller has no profile, and [`AppError::Conflict`] for a second
/// application.
#[utoipa::path(
    post,
    path = "/api/v1/jobs/{id}/applications",
    tag = "Applications",
    summary = "Apply to a job post",
    params(("id" = i64, Path, description = "Job post id")),
    request_body = ApplyRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Application submitted", body = ApplicationView),
        (status = 400, description = "Post not open or no profile", body = ErrorResponse),
        (status = 409, description = "Already applied", body = ErrorResponse),
    )
)]
pub async fn apply(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(job_post_id): AppPath<JobPostId>,
    AppJson(req): AppJson<ApplyRequest>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Student, Role::Admin])?;
    let view = state
        .applications
        .apply(&caller, job_post_id, req.into())
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /jobs/{id}/applications`: Applications to a post.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] unless the caller manages the post.
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}/applications",
    tag = "Applications",
    summary = "List applications to a job post",
    params(("id" = i64, Path, description = "Job post id"), PaginationParams),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Applications", body = Page<ApplicationView>),
        (status = 403, description = "Not a manager", body = ErrorResponse),
    )
)]
pub async fn job_applications(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(job_post_id): AppPath<JobPostId>,
    AppQuery(params): AppQuery<PaginationParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = state
        .applications
        .for_job(job_post_id, &caller, params.request())
        .await?;
    Ok(Json(page))
}

/// `GET /applications/me`: The caller's applications.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for employers.
#[utoipa::path(
    get,
    path = "/api/v1/applications/me",
    tag = "Applications",
    summary = "List own applications",
    params(PaginationParams),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Applications", body = Page<ApplicationView>),
    )
)]
pub async fn my_applications(
    State(state): State<AppState>,
    caller: AuthUser,
    AppQuery(params): AppQuery<PaginationParams>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Student, Role::Admin])?;
    Ok(Json(state.applications.mine(&caller, params.request()).await?))
}

/// `GET /applications/{id}`: One application.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] unless the caller is the applicant, a
/// manager of the post or an administrator.
#[utoipa::path(
    get,
    path = "/api/v1/applications/{id}",
    tag = "Applications",
    summary = "Get an application",
    params(("id" = i64, Path, description = "Application id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Application", body = ApplicationView),
        (status = 403, description = "Not visible to the caller", body = ErrorResponse),
        (status = 404, description = "Unknown application", body = ErrorResponse),
    )
)]
pub async fn get_application(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<ApplicationId>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.applications.get(id, &caller).await?))
}

/// `PATCH /applications/{id}/status`: Review an application.
///
/// # Errors
///
/// Returns [`AppError::InvalidOperation`] for withdrawn applications or a
/// `WITHDRAWN` target status.
#[utoipa::path(
    patch,
    path = "/api/v1/applications/{id}/status",
    tag = "Applications",
    summary = "Update application status",
    params(("id" = i64, Path, description = "Application id")),
    request_body = ApplicationStatusRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated", body = ApplicationView),
        (status = 400, description = "Transition not allowed", body = ErrorResponse),
        (status = 403, description = "Not a manager", body = ErrorResponse),
    )
)]
pub async fn update_status(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<ApplicationId>,
    AppJson(req): AppJson<ApplicationStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = state
        .applications
        .update_status(id, &caller, req.status, req.notes)
        .await?;
    Ok(Json(view))
}

/// `POST /applications/{id}/withdraw`: Withdraw an application.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for anyone but the applicant and
/// [`AppError::InvalidOperation`] from a final status.
#[utoipa::path(
    post,
    path = "/api/v1/applications/{id}/withdraw",
    tag = "Applications",
    summary = "Withdraw an application",
    params(("id" = i64, Path, description = "Application id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Withdrawn", body = ApplicationView),
        (status = 400, description = "Already final", body = ErrorResponse),
    )
)]
pub async fn withdraw(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<ApplicationId>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.applications.withdraw(id, &caller).await?))
}

/// Application routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/jobs/{id}/applications", post(apply).get(job_applications))
        .route("/applications/me", get(my_applications))
        .route("/applications/{id}", get(get_application))
        .route("/applications/{id}/status", patch(update_status))
        .route("/applications/{id}/withdraw", post(withdraw))
}
