use std::sync::Arc;

use kindred_api::config::AppConfig;
use kindred_api::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kindred_shared::middleware::init_tracing("kindred-api");

    let config = AppConfig::load()?;
    let port = config.port;

    let metrics_handle = kindred_shared::middleware::init_metrics()?;
    let state = Arc::new(AppState::new(config, Some(metrics_handle)));

    // Load eagerly so a corrupt document stops startup instead of the first request.
    state.store.load().await?;
    match state.store.path() {
        Some(path) => tracing::info!(path = %path.display(), "document store ready"),
        None => tracing::warn!("running with an in-memory store, nothing will be persisted"),
    }

    let app = kindred_api::router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "kindred-api starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
