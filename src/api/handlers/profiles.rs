//! Student profile handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::extractors::{AppJson, AppPath};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::profile::{Profile, ProfileDetails};
use crate::domain::{ProfileId, Role};
use crate::error::{AppError, ErrorResponse};

/// `GET /profiles/{id}`: Public profile.
///
/// # Errors
///
/// Returns [`AppError::NotFound`] for unknown ids.
#[utoipa::path(
    get,
    path = "/api/v1/profiles/{id}",
    tag = "Profiles",
    summary = "Get a profile",
    params(("id" = i64, Path, description = "Profile id")),
    responses(
        (status = 200, description = "Profile", body = Profile),
        (status = 404, description = "Unknown profile", body = ErrorResponse),
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    AppPath(id): AppPath<ProfileId>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.profiles.get(id).await?))
}

/// `GET /profiles/me`: The caller's profile.
///
/// # Errors
///
/// Returns [`AppError::NotFound`] before the profile is created.
#[utoipa::path(
    get,
    path = "/api/v1/profiles/me",
    tag = "Profiles",
    summary = "Get own profile",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Profile", body = Profile),
        (status = 404, description = "No profile yet", body = ErrorResponse),
    )
)]
pub async fn own_profile(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Student, Role::Admin])?;
    Ok(Json(state.profiles.own(&caller).await?))
}

/// `PUT /profiles/me`: Create or update the caller's profile.
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] for invalid fields.
#[utoipa::path(
    put,
    path = "/api/v1/profiles/me",
    tag = "Profiles",
    summary = "Save own profile",
    request_body = ProfileDetails,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Saved profile", body = Profile),
        (status = 400, description = "Invalid fields", body = ErrorResponse),
    )
)]
pub async fn save_own_profile(
    State(state): State<AppState>,
    caller: AuthUser,
    AppJson(details): AppJson<ProfileDetails>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Student, Role::Admin])?;
    Ok(Json(state.profiles.save_own(&caller, details).await?))
}

/// `DELETE /profiles/{id}`: Delete a profile and its applications.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] unless the caller owns the profile or
/// is an administrator.
#[utoipa::path(
    delete,
    path = "/api/v1/profiles/{id}",
    tag = "Profiles",
    summary = "Delete a profile",
    params(("id" = i64, Path, description = "Profile id")),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the owner", body = ErrorResponse),
    )
)]
pub async fn delete_profile(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<ProfileId>,
) -> Result<impl IntoResponse, AppError> {
    caller.require_role(&[Role::Student, Role::Admin])?;
    state.profiles.delete(id, &caller).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Profile routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/profiles/me", get(own_profile).put(save_own_profile))
        .route("/profiles/{id}", get(get_profile).delete(delete_profile))
}
