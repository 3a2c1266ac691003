//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All endpoints are mounted under `/api/v1`; `/health`, `/openapi.json`
//! and `/ws` sit at the root.

pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod openapi;

use std::any::Any;
use std::time::Duration;

use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::error::AppError;
use crate::ws::handler::ws_handler;

/// Builds the complete application: REST, WebSocket, OpenAPI, the audit
/// middleware and the tower-http stack.
///
/// The AI assistant routes get their own timeout sized from the model
/// client's retry budget; everything else uses `REQUEST_TIMEOUT_SECS`.
/// The audit middleware wraps both timeouts so a timed-out request is
/// still logged.
pub fn build_app(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.request_timeout_secs);
    let ai_timeout = request_timeout.max(state.config.ai.call_budget());

    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
        .route("/ws", get(ws_handler))
        .route("/openapi.json", get(|| async { Json(openapi::ApiDoc::openapi()) }));

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
    );

    let assistant = Router::new()
        .nest("/api/v1", handlers::ai_chat::routes())
        .layer(TimeoutLayer::new(ai_timeout));

    router
        .layer(TimeoutLayer::new(request_timeout))
        .merge(assistant)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::audit,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Turns a handler panic into an internal error so it is audited like any
/// other failure.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    AppError::Internal(format!("handler panicked: {detail}")).into_response()
}
