//! Shared fixtures for the integration tests.

#![allow(dead_code, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use jobboard_gateway::app_state::AppState;
use jobboard_gateway::auth::TokenService;
use jobboard_gateway::auth::password::hash_password;
use jobboard_gateway::config::AppConfig;
use jobboard_gateway::domain::Role;
use jobboard_gateway::domain::user::NewUser;
use jobboard_gateway::llm::{ChatCompletion, LlmError, PromptMessage};
use jobboard_gateway::persistence::{MemoryStore, Store};

/// Model that echoes the last user turn.
#[derive(Debug, Default)]
pub struct EchoModel;

#[async_trait]
impl ChatCompletion for EchoModel {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, LlmError> {
        Ok(messages
            .last()
            .map(|m| format!("echo: {}", m.content))
            .unwrap_or_default())
    }
}

/// Model that answers only after `delay`.
#[derive(Debug)]
pub struct SlowModel {
    pub delay: Duration,
}

#[async_trait]
impl ChatCompletion for SlowModel {
    async fn complete(&self, _messages: &[PromptMessage]) -> Result<String, LlmError> {
        tokio::time::sleep(self.delay).await;
        Ok("sorry for the wait".to_string())
    }
}

/// A gateway over an in-memory store, plus the directory backing uploads.
#[derive(Debug)]
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    _uploads: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(|_| {}, Arc::new(EchoModel))
    }

    /// Builds the gateway with adjusted settings and a custom model.
    pub fn with(configure: impl FnOnce(&mut AppConfig), model: Arc<dyn ChatCompletion>) -> Self {
        let Ok(uploads) = tempfile::tempdir() else {
            panic!("tempdir failed");
        };
        let mut config = AppConfig::for_tests(uploads.path().to_path_buf());
        configure(&mut config);
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let state = AppState::new(config, store, model);
        let router = jobboard_gateway::build_app(state.clone());
        Self {
            state,
            router,
            _uploads: uploads,
        }
    }

    /// Sends one request and returns the status with the decoded JSON body
    /// (`Value::Null` for empty bodies).
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        };
        let Ok(request) = request else {
            panic!("bad request");
        };
        let Ok(response) = self.router.clone().oneshot(request).await else {
            panic!("router failed");
        };
        let status = response.status();
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body read failed");
        };
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Registers an account and returns `(user_id, access_token)`.
    pub async fn register(&self, email: &str, role: &str) -> (i64, String) {
        let (status, body) = self
            .call(
                "POST",
                "/api/v1/auth/register",
                None,
                Some(serde_json::json!({
                    "email": email,
                    "password": "correct-horse-battery",
                    "full_name": email.split('@').next().unwrap_or(email),
                    "role": role,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        session(&body)
    }

    /// Seeds an administrator and signs them in.
    pub async fn admin(&self) -> (i64, String) {
        let Ok(hash) = hash_password("admin-password-1") else {
            panic!("hash failed");
        };
        let Ok(_) = self
            .state
            .store
            .insert_user(NewUser {
                email: "admin@jobs.test".into(),
                password_hash: hash,
                full_name: Some("Admin".into()),
                role: Role::Admin,
            })
            .await
        else {
            panic!("seed admin failed");
        };
        let (status, body) = self
            .call(
                "POST",
                "/api/v1/auth/login",
                None,
                Some(serde_json::json!({
                    "email": "admin@jobs.test",
                    "password": "admin-password-1",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "admin login failed: {body}");
        session(&body)
    }

    /// Inserts an account straight into the store and mints its access
    /// token without going through the HTTP sign-in.
    pub async fn seed(&self, email: &str, role: Role) -> (i64, String) {
        let Ok(user) = self
            .state
            .store
            .insert_user(NewUser {
                email: email.into(),
                password_hash: "not-a-login-account".into(),
                full_name: None,
                role,
            })
            .await
        else {
            panic!("seed {email} failed");
        };
        let tokens = TokenService::new(&self.state.config);
        let Ok((token, _)) = tokens.issue_access(&user, chrono::Utc::now()) else {
            panic!("token signing failed");
        };
        (user.id.get(), token)
    }
}

fn session(body: &Value) -> (i64, String) {
    let Some(id) = body.pointer("/user/id").and_then(Value::as_i64) else {
        panic!("no user id in {body}");
    };
    let Some(token) = body.get("access_token").and_then(Value::as_str) else {
        panic!("no access token in {body}");
    };
    (id, token.to_string())
}
