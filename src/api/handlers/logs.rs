//! Activity and error log queries for administrators.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::PaginationParams;
use crate::api::extractors::AppQuery;
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::logs::{ActivityFilter, ActivityLog, ActivityStats, ErrorFilter, ErrorLog, ErrorStats};
use crate::domain::{Page, Role};
use crate::error::{AppError, ErrorResponse};

/// `GET /admin/logs/activities`: Request log, newest first.
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] when `start` is after `end`.
#[utoipa::path(
    get,
    path = "/api/v1/admin/logs/activities",
    tag = "Logs",
    summary = "Query activity logs",
    description = "Filters: `user_id`, `start`, `end` (RFC 3339).",
    params(PaginationParams),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Activity rows", body = Page<ActivityLog>),
        (status = 403, description = "Admin only", body = ErrorResponse),
    )
)]
pub async fn activities(
    State(state): State<AppState>,
    caller: AuthUser,
    AppQuery(filter): AppQuery<ActivityFilter>,
    AppQuery(params): AppQuery<PaginationParams>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Admin])?;
    Ok(Json(state.audit.activities(&filter, params.request()).await?))
}

/// `GET /admin/logs/errors`: Error log, newest first.
///
/// # Errors
///
/// As [`activities`].
#[utoipa::path(
    get,
    path = "/api/v1/admin/logs/errors",
    tag = "Logs",
    summary = "Query error logs",
    description = "Filters: `level` (Warning, Error, Critical), `start`, `end`.",
    params(PaginationParams),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Error rows", body = Page<ErrorLog>),
        (status = 403, description = "Admin only", body = ErrorResponse),
    )
)]
pub async fn errors(
    State(state): State<AppState>,
    caller: AuthUser,
    AppQuery(filter): AppQuery<ErrorFilter>,
    AppQuery(params): AppQuery<PaginationParams>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Admin])?;
    Ok(Json(state.audit.errors(&filter, params.request()).await?))
}

/// `GET /admin/logs/activities/stats`: Request statistics.
///
/// # Errors
///
/// As [`activities`].
#[utoipa::path(
    get,
    path = "/api/v1/admin/logs/activities/stats",
    tag = "Logs",
    summary = "Activity statistics",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Aggregates", body = ActivityStats),
    )
)]
pub async fn activity_stats(
    State(state): State<AppState>,
    caller: AuthUser,
    AppQuery(filter): AppQuery<ActivityFilter>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Admin])?;
    Ok(Json(state.audit.activity_stats(&filter).await?))
}

/// `GET /admin/logs/errors/stats`: Error statistics.
///
/// # Errors
///
/// As [`activities`].
#[utoipa::path(
    get,
    path = "/api/v1/admin/logs/errors/stats",
    tag = "Logs",
    summary = "Error statistics",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Aggregates", body = ErrorStats),
    )
)]
pub async fn error_stats(
    State(state): State<AppState>,
    caller: AuthUser,
    AppQuery(filter): AppQuery<ErrorFilter>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Admin])?;
    Ok(Json(state.audit.error_stats(&filter).await?))
}

/// Log query routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/logs/activities", get(activities))
        .route("/admin/logs/activities/stats", get(activity_stats))
        .route("/admin/logs/errors", get(errors))
        .route("/admin/logs/errors/stats", get(error_stats))
}
