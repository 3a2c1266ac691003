//! # jobboard-gateway
//!
//! REST API and WebSocket gateway for a part-time job board.
//!
//! Students browse job posts and apply, employers run companies and publish
//! posts, administrators review company requests and watch the audit logs.
//! Employers and students talk through a one-to-one chat that is pushed
//! over WebSocket, and an AI assistant answers questions through an
//! OpenAI-compatible model runtime.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── Services (service/)
//!     ├── EventBus (domain/)
//!     │
//!     ├── Store trait (persistence/)
//!     │     ├── MemoryStore
//!     │     └── PostgresStore
//!     │
//!     └── Model runtime (llm/)
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod llm;
pub mod persistence;
pub mod service;
pub mod ws;

pub use api::build_app;
pub use app_state::AppState;
pub use config::AppConfig;
pub use error::AppError;
