use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kindred_shared::{HealthCheck, HealthResponse, HealthStatus};
use std::sync::Arc;

use crate::AppState;

/// Health check that also makes sure the document can be loaded.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let store_check = match state.store.load().await {
        Ok(_) => HealthCheck {
            name: "store".to_string(),
            status: HealthStatus::Healthy,
            message: state.store.path().map(|p| p.display().to_string()),
        },
        Err(e) => HealthCheck {
            name: "store".to_string(),
            status: HealthStatus::Unhealthy,
            message: Some(e.to_string()),
        },
    };

    let response = HealthResponse::healthy("kindred-api", env!("CARGO_PKG_VERSION"))
        .with_checks(vec![store_check]);

    let status = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(response)).into_response()
}

/// Prometheus exposition. Empty when no recorder was installed.
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}
