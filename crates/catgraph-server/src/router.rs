//! Axum router setup for the Catgraph server

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{get_artifact, health_check, purge_cache, render},
    ServerState,
};

/// Create the axum router with all routes
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/render", get(render))
        .route("/artifact/:file", get(get_artifact))
        .route("/api/health", get(health_check))
        .route("/api/purge", post(purge_cache))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
