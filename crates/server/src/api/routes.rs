use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{artifacts, handlers, middleware::metrics_middleware};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Artifacts
        .route(
            "/artifacts",
            get(artifacts::list_artifacts).post(artifacts::add_artifact),
        )
        .route("/artifacts/track", post(artifacts::track_artifact))
        .route("/artifacts/track/all", post(artifacts::track_all))
        .route("/artifacts/validate/all", post(artifacts::validate_all))
        .route("/artifacts/collect", post(artifacts::collect_artifact))
        .route(
            "/artifacts/{processor}/{*id}",
            get(artifacts::get_artifact).delete(artifacts::delete_artifact),
        )
        .route_layer(middleware::from_fn(metrics_middleware))
        .with_state(Arc::clone(&state));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
