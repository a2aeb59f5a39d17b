use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use evidence_backend::core::config::{missing_requirements, AppPaths, ConfigService};
use evidence_backend::core::logging;
use evidence_backend::server;
use evidence_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    logging::init(&paths);

    let config_service = ConfigService::new(paths.clone());
    let config = config_service
        .load_config()
        .with_context(|| format!("Failed to load {}", config_service.config_path().display()))?;

    for missing in missing_requirements(&config) {
        tracing::warn!("Missing configuration: {}", missing);
    }
    tracing::debug!(
        config = %config_service.redact_sensitive_values(&config),
        "Loaded configuration"
    );

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::initialize(paths, config).await?;

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
