//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use serde::Deserialize;

use super::connection::run_connection;
use crate::api::extractors::AppQuery;
use crate::app_state::AppState;
use crate::auth::bearer_token;
use crate::error::AppError;

/// Query accepted on `/ws`; browsers cannot set headers on a WebSocket.
#[derive(Debug, Default, Deserialize)]
pub struct WsAuthParams {
    /// Access token, used when no `Authorization` header is present.
    #[serde(default)]
    pub access_token: Option<String>,
}

/// `GET /ws`: Authenticate, then upgrade the HTTP connection to WebSocket.
///
/// # Errors
///
/// Returns [`AppError::Unauthorized`] before the upgrade when neither the
/// header nor the query carries a valid token.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
    AppQuery(params): AppQuery<WsAuthParams>,
) -> Result<impl IntoResponse, AppError> {
    let token = bearer_token(&headers)
        .map(str::to_string)
        .or(params.access_token)
        .ok_or_else(|| AppError::Unauthorized("missing access token".into()))?;
    let caller = state.auth.authenticate(&token).await?;

    let event_rx = state.event_bus.subscribe();
    let chat = Arc::clone(&state.chat);
    let auth = Arc::clone(&state.auth);

    Ok(ws.on_upgrade(move |socket| run_connection(socket, caller, event_rx, chat, auth)))
}
