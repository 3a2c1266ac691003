//! jobboard-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use jobboard_gateway::app_state::AppState;
use jobboard_gateway::config::{AppConfig, StorageBackend};
use jobboard_gateway::llm::{ChatCompletion, OpenAiClient};
use jobboard_gateway::persistence::{MemoryStore, PostgresStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // Load configuration
    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        addr = %config.listen_addr,
        storage = config.storage_backend.as_str(),
        development = config.development,
        "starting jobboard-gateway"
    );

    // Build persistence layer
    let store: Arc<dyn Store> = match config.storage_backend {
        StorageBackend::Postgres => Arc::new(
            PostgresStore::connect(&config)
                .await
                .context("failed to open the database")?,
        ),
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Model runtime
    let model: Arc<dyn ChatCompletion> =
        Arc::new(OpenAiClient::new(&config.ai).context("failed to build the model client")?);

    // Build application state
    let listen_addr = config.listen_addr;
    let retention_days = config.log_retention_days;
    let state = AppState::new(config, store, model);
    let _retention = state.audit.spawn_retention(retention_days);

    let app = jobboard_gateway::build_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;
    tracing::info!(addr = %listen_addr, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server stopped");
    Ok(())
}

/// Installs the global subscriber. `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
