//! System-level handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::rest::state::AppState;

#[derive(Debug, Serialize)]
pub struct ShutdownResponse {
    pub status: String,
    pub message: String,
}

/// Asks the daemon to shut down gracefully.
pub async fn shutdown_daemon(State(state): State<AppState>) -> Json<ShutdownResponse> {
    match state.shutdown_tx.send(true) {
        Ok(()) => {
            tracing::warn!("shutdown requested via API");
            Json(ShutdownResponse {
                status: "accepted".to_string(),
                message: "daemon is shutting down".to_string(),
            })
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to signal shutdown");
            Json(ShutdownResponse {
                status: "error".to_string(),
                message: "shutdown channel closed".to_string(),
            })
        }
    }
}
