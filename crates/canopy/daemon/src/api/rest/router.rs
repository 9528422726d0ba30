//! REST router assembly.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::rest::handlers;
use crate::api::rest::state::AppState;

/// Builds the complete REST surface.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health and status
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::daemon_status))
        // System control
        .route("/system/shutdown", post(handlers::shutdown_daemon))
        // Deployment lifecycle
        .route(
            "/deployments",
            get(handlers::list_deployments).post(handlers::create_deployment),
        )
        .route(
            "/deployments/:id",
            get(handlers::get_deployment)
                .put(handlers::update_deployment)
                .delete(handlers::delete_deployment),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
