pub mod config;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use kindred_shared::middleware::metrics_middleware;

use crate::config::AppConfig;
use crate::models::DocStore;
use crate::routes::{
    auth, conversations, discover, health, match_queue, matches, profiles, users, verification,
};

pub struct AppState {
    pub config: AppConfig,
    pub store: DocStore,
    /// `None` in tests, where no global recorder is installed.
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: AppConfig, metrics_handle: Option<PrometheusHandle>) -> Self {
        let store = DocStore::open(config.store_path());
        Self {
            config,
            store,
            metrics_handle,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        // Identity
        .route("/api/auth", post(auth::handle))
        .route("/api/users", get(users::lookup).post(users::handle))
        .route("/api/verification", post(verification::handle))
        // Profiles and discovery
        .route("/api/profiles", get(profiles::get_profile).post(profiles::handle))
        .route("/api/discover", get(discover::candidates).post(discover::swipe))
        // Matches and messaging
        .route("/api/matches", get(matches::list_matches))
        .route("/api/match-queue", get(match_queue::get_match_queue))
        .route(
            "/api/conversations",
            get(conversations::get_conversations).post(conversations::send_message),
        )
        .layer(middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
