//! Conversation and message handlers.
//!
//! REST sends and read receipts go through the same [`crate::service::ChatService`]
//! calls as the WebSocket commands, so connected clients receive the same
//! events either way.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{CountResponse, PaginationParams, StartConversationRequest};
use crate::api::extractors::{AppJson, AppPath, AppQuery};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::chat::{ConversationSummary, MessageView, SendMessage};
use crate::domain::{ConversationId, Page};
use crate::error::{AppError, ErrorResponse};
use crate::service::chat_service::ReadReceipt;

/// `GET /chat/conversations`: The caller's conversations.
///
/// # Errors
///
/// Propagates store failures.
#[utoipa::path(
    get,
    path = "/api/v1/chat/conversations",
    tag = "Chat",
    summary = "List conversations",
    params(PaginationParams),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Conversations, latest activity first", body = Page<ConversationSummary>),
    )
)]
pub async fn list_conversations(
    State(state): State<AppState>,
    caller: AuthUser,
    AppQuery(params): AppQuery<PaginationParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.chat.conversations(&caller, params.request()).await?))
}

/// `POST /chat/conversations`: Find or start a conversation.
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] unless exactly one side is an
/// employer and the other a student.
#[utoipa::path(
    post,
    path = "/api/v1/chat/conversations",
    tag = "Chat",
    summary = "Start a conversation",
    request_body = StartConversationRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Existing or new conversation", body = ConversationSummary),
        (status = 400, description = "Participants not allowed", body = ErrorResponse),
        (status = 404, description = "Unknown recipient or job post", body = ErrorResponse),
    )
)]
pub async fn start_conversation(
    State(state): State<AppState>,
    caller: AuthUser,
    AppJson(req): AppJson<StartConversationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let summary = state
        .chat
        .start(&caller, req.recipient_id, req.job_post_id)
        .await?;
    Ok(Json(summary))
}

/// `GET /chat/conversations/{id}`: One conversation.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for non-participants.
#[utoipa::path(
    get,
    path = "/api/v1/chat/conversations/{id}",
    tag = "Chat",
    summary = "Get a conversation",
    params(("id" = i64, Path, description = "Conversation id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Conversation", body = ConversationSummary),
        (status = 403, description = "Not a participant", body = ErrorResponse),
        (status = 404, description = "Unknown conversation", body = ErrorResponse),
    )
)]
pub async fn get_conversation(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<ConversationId>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.chat.conversation(&caller, id).await?))
}

/// `GET /chat/conversations/{id}/messages`: A page of messages.
///
/// Page 1 holds the newest messages; each page is in chronological order.
///
/// # Errors
///
/// As [`get_conversation`].
#[utoipa::path(
    get,
    path = "/api/v1/chat/conversations/{id}/messages",
    tag = "Chat",
    summary = "List messages",
    params(("id" = i64, Path, description = "Conversation id"), PaginationParams),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Messages", body = Page<MessageView>),
        (status = 403, description = "Not a participant", body = ErrorResponse),
    )
)]
pub async fn list_messages(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<ConversationId>,
    AppQuery(params): AppQuery<PaginationParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(
        state.chat.messages(&caller, id, params.request()).await?,
    ))
}

/// `POST /chat/messages`: Send a message.
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] for empty or oversized content and
/// [`AppError::Forbidden`] for non-participants.
#[utoipa::path(
    post,
    path = "/api/v1/chat/messages",
    tag = "Chat",
    summary = "Send a message",
    request_body = SendMessage,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Stored and delivered", body = MessageView),
        (status = 400, description = "Invalid content", body = ErrorResponse),
        (status = 403, description = "Not a participant", body = ErrorResponse),
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    caller: AuthUser,
    AppJson(req): AppJson<SendMessage>,
) -> Result<impl IntoResponse, AppError> {
    let message = state.chat.send(&caller, req).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// `POST /chat/conversations/{id}/read`: Mark the counterpart's messages read.
///
/// # Errors
///
/// As [`get_conversation`].
#[utoipa::path(
    post,
    path = "/api/v1/chat/conversations/{id}/read",
    tag = "Chat",
    summary = "Mark messages as read",
    params(("id" = i64, Path, description = "Conversation id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Read receipt", body = ReadReceipt),
        (status = 403, description = "Not a participant", body = ErrorResponse),
    )
)]
pub async fn mark_as_read(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<ConversationId>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.chat.mark_as_read(&caller, id).await?))
}

/// `GET /chat/unread-count`: Unread messages across all conversations.
///
/// # Errors
///
/// Propagates store failures.
#[utoipa::path(
    get,
    path = "/api/v1/chat/unread-count",
    tag = "Chat",
    summary = "Total unread messages",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Unread count", body = CountResponse),
    )
)]
pub async fn unread_count(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let count = state.chat.unread_total(&caller).await?;
    Ok(Json(CountResponse { count }))
}

/// Chat routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/chat/conversations",
            get(list_conversations).post(start_conversation),
        )
        .route("/chat/conversations/{id}", get(get_conversation))
        .route("/chat/conversations/{id}/messages", get(list_messages))
        .route("/chat/conversations/{id}/read", post(mark_as_read))
        .route("/chat/messages", post(send_message))
        .route("/chat/unread-count", get(unread_count))
}
