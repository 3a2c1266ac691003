//! Company handlers and the registration-request review queue.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{CompanyListParams, PaginationParams, RejectCompanyRequest};
use crate::api::extractors::{AppJson, AppPath, AppQuery};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::company::{Company, CompanyDetails, CompanyRequest};
use crate::domain::{CompanyId, CompanyRequestId, Page, Role};
use crate::error::{AppError, ErrorResponse};

/// `POST /company-requests`: Ask for a company to be registered.
///
/// # Errors
///
/// Returns [`AppError::InvalidOperation`] if the caller already owns a
/// company or has a pending request.
#[utoipa::path(
    post,
    path = "/api/v1/company-requests",
    tag = "Companies",
    summary = "Submit a company registration request",
    request_body = CompanyDetails,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Request stored", body = CompanyRequest),
        (status = 400, description = "Invalid or duplicate request", body = ErrorResponse),
    )
)]
pub async fn submit_request(
    State(state): State<AppState>,
    caller: AuthUser,
    AppJson(details): AppJson<CompanyDetails>,
) -> Result<impl IntoResponse, AppError> {
    let request = state.companies.submit_request(&caller, details).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// `GET /company-requests`: Pending requests, oldest first.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for non-admins.
#[utoipa::path(
    get,
    path = "/api/v1/company-requests",
    tag = "Companies",
    summary = "List pending company requests",
    params(PaginationParams),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Pending requests", body = Page<CompanyRequest>),
        (status = 403, description = "Admin only", body = ErrorResponse),
    )
)]
pub async fn pending_requests(
    State(state): State<AppState>,
    caller: AuthUser,
    AppQuery(params): AppQuery<PaginationParams>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Admin])?;
    Ok(Json(state.companies.pending_requests(params.request()).await?))
}

/// `GET /company-requests/{id}`: One request.
///
/// # Errors
///
/// Returns [`AppError::NotFound`] for unknown ids.
#[utoipa::path(
    get,
    path = "/api/v1/company-requests/{id}",
    tag = "Companies",
    summary = "Get a company request",
    params(("id" = i64, Path, description = "Request id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Request", body = CompanyRequest),
        (status = 404, description = "Unknown request", body = ErrorResponse),
    )
)]
pub async fn get_request(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<CompanyRequestId>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Admin])?;
    Ok(Json(state.companies.request(id).await?))
}

/// `POST /company-requests/{id}/approve`: Approve and create the company.
///
/// # Errors
///
/// Returns [`AppError::InvalidOperation`] if the request was already decided.
#[utoipa::path(
    post,
    path = "/api/v1/company-requests/{id}/approve",
    tag = "Companies",
    summary = "Approve a company request",
    params(("id" = i64, Path, description = "Request id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Approved", body = CompanyRequest),
        (status = 400, description = "Not pending", body = ErrorResponse),
    )
)]
pub async fn approve_request(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<CompanyRequestId>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Admin])?;
    Ok(Json(state.companies.approve(id, &caller).await?))
}

/// `POST /company-requests/{id}/reject`: Reject with a reason.
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] without a reason.
#[utoipa::path(
    post,
    path = "/api/v1/company-requests/{id}/reject",
    tag = "Companies",
    summary = "Reject a company request",
    params(("id" = i64, Path, description = "Request id")),
    request_body = RejectCompanyRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Rejected", body = CompanyRequest),
        (status = 400, description = "Missing reason or not pending", body = ErrorResponse),
    )
)]
pub async fn reject_request(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<CompanyRequestId>,
    AppJson(req): AppJson<RejectCompanyRequest>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Admin])?;
    Ok(Json(state.companies.reject(id, &caller, &req.reason).await?))
}

/// `GET /companies`: Search companies.
///
/// # Errors
///
/// Propagates store failures.
#[utoipa::path(
    get,
    path = "/api/v1/companies",
    tag = "Companies",
    summary = "List companies",
    params(CompanyListParams, PaginationParams),
    responses(
        (status = 200, description = "Companies", body = Page<Company>),
    )
)]
pub async fn list_companies(
    State(state): State<AppState>,
    AppQuery(filter): AppQuery<CompanyListParams>,
    AppQuery(params): AppQuery<PaginationParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = state
        .companies
        .list(filter.term.as_deref(), filter.newest_first(), params.request())
        .await?;
    Ok(Json(page))
}

/// `GET /companies/{id}`: One company.
///
/// # Errors
///
/// Returns [`AppError::NotFound`] for unknown ids.
#[utoipa::path(
    get,
    path = "/api/v1/companies/{id}",
    tag = "Companies",
    summary = "Get a company",
    params(("id" = i64, Path, description = "Company id")),
    responses(
        (status = 200, description = "Company", body = Company),
        (status = 404, description = "Unknown company", body = ErrorResponse),
    )
)]
pub async fn get_company(
    State(state): State<AppState>,
    AppPath(id): AppPath<CompanyId>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.companies.get(id).await?))
}

/// `GET /companies/me`: The caller's company.
///
/// # Errors
///
/// Returns [`AppError::NotFound`] if the caller owns none.
#[utoipa::path(
    get,
    path = "/api/v1/companies/me",
    tag = "Companies",
    summary = "Get own company",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Company", body = Company),
        (status = 404, description = "No company", body = ErrorResponse),
    )
)]
pub async fn own_company(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Employer, Role::Admin])?;
    Ok(Json(state.companies.own(&caller).await?))
}

/// `PUT /companies/{id}`: Replace the editable fields.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] unless the caller owns the company or
/// is an administrator.
#[utoipa::path(
    put,
    path = "/api/v1/companies/{id}",
    tag = "Companies",
    summary = "Update a company",
    params(("id" = i64, Path, description = "Company id")),
    request_body = CompanyDetails,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated company", body = Company),
        (status = 403, description = "Not the owner", body = ErrorResponse),
    )
)]
pub async fn update_company(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<CompanyId>,
    AppJson(details): AppJson<CompanyDetails>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Employer, Role::Admin])?;
    Ok(Json(state.companies.update(id, &caller, details).await?))
}

/// `DELETE /companies/{id}`: Delete a company with its job posts.
///
/// # Errors
///
/// As [`update_company`].
#[utoipa::path(
    delete,
    path = "/api/v1/companies/{id}",
    tag = "Companies",
    summary = "Delete a company",
    params(("id" = i64, Path, description = "Company id")),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the owner", body = ErrorResponse),
    )
)]
pub async fn delete_company(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<CompanyId>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Employer, Role::Admin])?;
    state.companies.delete(id, &caller).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Company routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/company-requests", post(submit_request).get(pending_requests))
        .route("/company-requests/{id}", get(get_request))
        .route("/company-requests/{id}/approve", post(approve_request))
        .route("/company-requests/{id}/reject", post(reject_request))
        .route("/companies", get(list_companies))
        .route("/companies/me", get(own_company))
        .route(
            "/companies/{id}",
            get(get_company).put(update_company).delete(delete_company),
        )
}
