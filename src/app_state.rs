//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::domain::EventBus;
use crate::llm::ChatCompletion;
use crate::persistence::Store;
use crate::service::{
    AdminService, AiChatService, ApplicationService, AuditService, AuthService, ChatService,
    CompanyService, FileService, JobService, ProfileService,
};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Loaded configuration.
    pub config: Arc<AppConfig>,
    /// Backing store.
    pub store: Arc<dyn Store>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
    /// Registration, login and token lifecycle.
    pub auth: Arc<AuthService>,
    /// Companies and registration requests.
    pub companies: Arc<CompanyService>,
    /// Job posts.
    pub jobs: Arc<JobService>,
    /// Student profiles.
    pub profiles: Arc<ProfileService>,
    /// Job applications.
    pub applications: Arc<ApplicationService>,
    /// Uploaded files.
    pub files: Arc<FileService>,
    /// Conversations and messages.
    pub chat: Arc<ChatService>,
    /// AI assistant.
    pub ai_chat: Arc<AiChatService>,
    /// Administration.
    pub admin: Arc<AdminService>,
    /// Activity and error logs.
    pub audit: Arc<AuditService>,
    /// Process start, reported by the health endpoint.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wires every service on top of `store` and `model`.
    #[must_use]
    pub fn new(config: AppConfig, store: Arc<dyn Store>, model: Arc<dyn ChatCompletion>) -> Self {
        let event_bus = EventBus::new(config.event_bus_capacity);
        let tokens = Arc::new(TokenService::new(&config));
        Self {
            auth: Arc::new(AuthService::new(Arc::clone(&store), tokens)),
            companies: Arc::new(CompanyService::new(Arc::clone(&store))),
            jobs: Arc::new(JobService::new(Arc::clone(&store))),
            profiles: Arc::new(ProfileService::new(Arc::clone(&store))),
            applications: Arc::new(ApplicationService::new(Arc::clone(&store))),
            files: Arc::new(FileService::new(
                Arc::clone(&store),
                config.upload_dir.clone(),
                config.upload_max_bytes,
            )),
            chat: Arc::new(ChatService::new(Arc::clone(&store), event_bus.clone())),
            ai_chat: Arc::new(AiChatService::new(Arc::clone(&store), model)),
            admin: Arc::new(AdminService::new(Arc::clone(&store))),
            audit: Arc::new(AuditService::new(Arc::clone(&store))),
            config: Arc::new(config),
            store,
            event_bus,
            started_at: Utc::now(),
        }
    }
}
