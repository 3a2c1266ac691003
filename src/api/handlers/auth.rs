//! Account handlers: register, login, token refresh and revocation.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{LoginRequest, RefreshTokenRequest, RegisterRequest};
use crate::api::extractors::{AppJson, ClientIp};
use crate::app_state::AppState;
use crate::auth::{AuthSession, AuthUser};
use crate::domain::user::UserView;
use crate::error::{AppError, ErrorResponse};

/// `POST /auth/register`: Create a student or employer account.
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] on bad input and
/// [`AppError::Conflict`] for a taken email.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "Auth",
    summary = "Register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created and signed in", body = AuthSession),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.auth.register(req.into(), Some(ip)).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// `POST /auth/login`: Exchange credentials for tokens.
///
/// # Errors
///
/// Returns [`AppError::Unauthorized`] for bad credentials or a locked account.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Auth",
    summary = "Login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthSession),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.auth.login(&req.email, &req.password, Some(ip)).await?;
    Ok(Json(session))
}

/// `POST /auth/refresh`: Rotate a refresh token.
///
/// # Errors
///
/// Returns [`AppError::Unauthorized`] for unknown, expired or revoked tokens.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "Auth",
    summary = "Refresh tokens",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New token pair", body = AuthSession),
        (status = 401, description = "Token rejected", body = ErrorResponse),
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    AppJson(req): AppJson<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.auth.refresh(&req.refresh_token, Some(ip)).await?;
    Ok(Json(session))
}

/// `POST /auth/revoke`: Revoke one of the caller's refresh tokens.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for another user's token and
/// [`AppError::InvalidOperation`] if it was already revoked.
#[utoipa::path(
    post,
    path = "/api/v1/auth/revoke",
    tag = "Auth",
    summary = "Revoke a refresh token",
    request_body = RefreshTokenRequest,
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Token revoked"),
        (status = 400, description = "Already revoked", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Unknown token", body = ErrorResponse),
    )
)]
pub async fn revoke(
    State(state): State<AppState>,
    caller: AuthUser,
    ClientIp(ip): ClientIp,
    AppJson(req): AppJson<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth
        .revoke(&req.refresh_token, &caller, Some(ip))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /auth/me`: The signed-in account.
///
/// # Errors
///
/// Returns [`AppError::Unauthorized`] without a valid token.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "Auth",
    summary = "Current user",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current account", body = UserView),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    )
)]
pub async fn me(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.auth.me(&caller).await?))
}

/// Account routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/revoke", post(revoke))
        .route("/auth/me", get(me))
}
