//! REST endpoint handlers organized by resource.

pub mod admin;
pub mod ai_chat;
pub mod applications;
pub mod auth;
pub mod chat;
pub mod companies;
pub mod files;
pub mod jobs;
pub mod logs;
pub mod profiles;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes the resource routes under `/api/v1`, except the AI
/// assistant which is mounted separately with its own timeout.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(auth::routes())
        .merge(companies::routes())
        .merge(jobs::routes())
        .merge(profiles::routes())
        .merge(applications::routes())
        .merge(files::routes())
        .merge(chat::routes())
        .merge(admin::routes())
        .merge(logs::routes())
}
