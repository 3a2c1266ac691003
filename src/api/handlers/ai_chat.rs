//! AI assistant handlers.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{AiChatRequest, RestartResponse};
use crate::api::extractors::AppJson;
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::ai_chat::AiReply;
use crate::error::{AppError, ErrorResponse};

/// `POST /ai-chat`: Send a message to the assistant.
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] for a blank message and
/// [`AppError::Upstream`] when the model runtime fails.
#[utoipa::path(
    post,
    path = "/api/v1/ai-chat",
    tag = "AI Assistant",
    summary = "Chat with the assistant",
    request_body = AiChatRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Assistant reply", body = AiReply),
        (status = 400, description = "Blank message", body = ErrorResponse),
        (status = 502, description = "Model runtime failed", body = ErrorResponse),
    )
)]
pub async fn chat(
    State(state): State<AppState>,
    caller: AuthUser,
    AppJson(req): AppJson<AiChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.ai_chat.chat(&caller, &req.message).await?))
}

/// `POST /ai-chat/restart`: End the active session.
///
/// # Errors
///
/// Propagates store failures.
#[utoipa::path(
    post,
    path = "/api/v1/ai-chat/restart",
    tag = "AI Assistant",
    summary = "Start over",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Sessions ended", body = RestartResponse),
    )
)]
pub async fn restart(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let ended_sessions = state.ai_chat.restart(&caller).await?;
    Ok(Json(RestartResponse { ended_sessions }))
}

/// Assistant routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ai-chat", post(chat))
        .route("/ai-chat/restart", post(restart))
}
