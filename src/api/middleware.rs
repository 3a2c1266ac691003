//! Request audit middleware.
//!
//! Every request produces one `info` event and one activity row. Responses
//! carrying an [`ErrorReport`] (any [`crate::error::AppError`]) also
//! produce an error row with the same request context, as do requests cut
//! off by the timeout layer.

use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::http::header::USER_AGENT;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;

use crate::api::extractors::client_ip;
use crate::app_state::AppState;
use crate::auth::bearer_token;
use crate::domain::logs::{ErrorLevel, NewActivityLog, NewErrorLog, sanitize_query};
use crate::error::ErrorReport;

/// Records the request in the activity log and, for error responses, in
/// the error log.
pub async fn audit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let query = sanitize_query(request.uri().query());
    let ip_address = client_ip(request.headers(), request.extensions());
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let user_id = bearer_token(request.headers()).and_then(|t| state.auth.peek_user_id(t));

    let response = next.run(request).await;

    let status = response.status();
    let duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
    let timestamp = Utc::now();
    tracing::info!(
        %method,
        %path,
        status = status.as_u16(),
        duration_ms,
        user_id = user_id.map_or_else(|| "anonymous".to_string(), |u| u.to_string()),
        ip = %ip_address,
        "request handled"
    );

    let report = response.extensions().get::<ErrorReport>().cloned().or_else(|| {
        (status == StatusCode::REQUEST_TIMEOUT).then(|| ErrorReport {
            level: ErrorLevel::Error,
            kind: "Timeout",
            message: "request timed out".to_string(),
        })
    });
    if let Some(report) = report {
        match report.level {
            ErrorLevel::Critical => {
                tracing::error!(%method, %path, kind = report.kind, message = %report.message, "request failed");
            }
            ErrorLevel::Error | ErrorLevel::Warning => {
                tracing::warn!(%method, %path, kind = report.kind, message = %report.message, "request rejected");
            }
        }
        state
            .audit
            .record_error(NewErrorLog {
                level: report.level,
                message: report.message,
                error_type: Some(report.kind.to_string()),
                details: Some(format!("HTTP {}", status.as_u16())),
                user_id,
                path: Some(path.clone()),
                method: Some(method.clone()),
                query: query.clone(),
                ip_address: Some(ip_address.clone()),
                user_agent: user_agent.clone(),
                source: Some(env!("CARGO_PKG_NAME").to_string()),
                timestamp,
            })
            .await;
    }

    state
        .audit
        .record_activity(NewActivityLog {
            user_id,
            method,
            path,
            query,
            ip_address,
            user_agent,
            status_code: i32::from(status.as_u16()),
            duration_ms,
            timestamp,
        })
        .await;

    response
}
