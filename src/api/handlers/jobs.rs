//! Job post handlers: public search and employer management.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use axum::{Json, Router};

use crate::api::dto::{JobStatusRequest, PaginationParams};
use crate::api::extractors::{AppJson, AppPath, AppQuery};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::job_post::{JobPost, JobPostDraft, JobPostPatch, JobSearch};
use crate::domain::{CompanyId, JobPostId, Page, Role};
use crate::error::{AppError, ErrorResponse};

/// `GET /jobs`: Active job posts matching the filters, newest first.
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] for an inverted salary range.
#[utoipa::path(
    get,
    path = "/api/v1/jobs",
    tag = "Jobs",
    summary = "Search job posts",
    description = "Filters: `term`, `location`, `category`, `work_type`, `salary_min`, `salary_max`.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Matching posts", body = Page<JobPost>),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
    )
)]
pub async fn search_jobs(
    State(state): State<AppState>,
    AppQuery(search): AppQuery<JobSearch>,
    AppQuery(params): AppQuery<PaginationParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.jobs.search(search, params.request()).await?))
}

/// `GET /jobs/{id}`: One post; counts as a view.
///
/// # Errors
///
/// Returns [`AppError::NotFound`] for unknown ids.
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    tag = "Jobs",
    summary = "Get a job post",
    params(("id" = i64, Path, description = "Job post id")),
    responses(
        (status = 200, description = "Job post", body = JobPost),
        (status = 404, description = "Unknown post", body = ErrorResponse),
    )
)]
pub async fn get_job(
    State(state): State<AppState>,
    AppPath(id): AppPath<JobPostId>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.jobs.view(id).await?))
}

/// `GET /companies/{id}/jobs`: Every post of a company.
///
/// # Errors
///
/// Returns [`AppError::NotFound`] for unknown companies.
#[utoipa::path(
    get,
    path = "/api/v1/companies/{id}/jobs",
    tag = "Jobs",
    summary = "List a company's job posts",
    params(("id" = i64, Path, description = "Company id"), PaginationParams),
    responses(
        (status = 200, description = "Company posts", body = Page<JobPost>),
        (status = 404, description = "Unknown company", body = ErrorResponse),
    )
)]
pub async fn company_jobs(
    State(state): State<AppState>,
    AppPath(id): AppPath<CompanyId>,
    AppQuery(params): AppQuery<PaginationParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.jobs.by_company(id, params.request()).await?))
}

/// `POST /jobs`: Publish a post for the caller's company.
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] for an invalid draft and
/// [`AppError::InvalidOperation`] when the caller owns no company.
#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    tag = "Jobs",
    summary = "Create a job post",
    request_body = JobPostDraft,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Created", body = JobPost),
        (status = 400, description = "Invalid draft", body = ErrorResponse),
        (status = 403, description = "Employers only", body = ErrorResponse),
    )
)]
pub async fn create_job(
    State(state): State<AppState>,
    caller: AuthUser,
    AppJson(draft): AppJson<JobPostDraft>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Employer, Role::Admin])?;
    let post = state.jobs.create(&caller, draft).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// `PUT /jobs/{id}`: Partial update.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] unless the caller manages the post.
#[utoipa::path(
    put,
    path = "/api/v1/jobs/{id}",
    tag = "Jobs",
    summary = "Update a job post",
    params(("id" = i64, Path, description = "Job post id")),
    request_body = JobPostPatch,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated", body = JobPost),
        (status = 403, description = "Not a manager", body = ErrorResponse),
        (status = 404, description = "Unknown post", body = ErrorResponse),
    )
)]
pub async fn update_job(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<JobPostId>,
    AppJson(patch): AppJson<JobPostPatch>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Employer, Role::Admin])?;
    Ok(Json(state.jobs.update(id, &caller, patch).await?))
}

/// `DELETE /jobs/{id}`: Delete a post and its applications.
///
/// # Errors
///
/// As [`update_job`].
#[utoipa::path(
    delete,
    path = "/api/v1/jobs/{id}",
    tag = "Jobs",
    summary = "Delete a job post",
    params(("id" = i64, Path, description = "Job post id")),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not a manager", body = ErrorResponse),
    )
)]
pub async fn delete_job(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<JobPostId>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Employer, Role::Admin])?;
    state.jobs.delete(id, &caller).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PATCH /jobs/{id}/status`: Change the publication status.
///
/// # Errors
///
/// As [`update_job`].
#[utoipa::path(
    patch,
    path = "/api/v1/jobs/{id}/status",
    tag = "Jobs",
    summary = "Change job post status",
    params(("id" = i64, Path, description = "Job post id")),
    request_body = JobStatusRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Status changed", body = JobPost),
        (status = 403, description = "Not a manager", body = ErrorResponse),
    )
)]
pub async fn set_job_status(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<JobPostId>,
    AppJson(req): AppJson<JobStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Employer, Role::Admin])?;
    Ok(Json(state.jobs.set_status(id, &caller, req.status).await?))
}

/// Job post routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(search_jobs).post(create_job))
        .route(
            "/jobs/{id}",
            get(get_job).put(update_job).delete(delete_job),
        )
        .route("/jobs/{id}/status", patch(set_job_status))
        .route("/companies/{id}/jobs", get(company_jobs))
}
