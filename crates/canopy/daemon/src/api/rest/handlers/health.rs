//! Health and status handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::rest::state::AppState;
use crate::error::ApiResult;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub engine: String,
    pub project: String,
    pub uptime_seconds: i64,
    pub deployments: usize,
    pub operations_in_flight: usize,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn daemon_status(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    let deployments = state.orchestrator.list().await?.len();
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
        engine: state.orchestrator.backend_name().to_string(),
        project: state.orchestrator.project().to_string(),
        uptime_seconds: state.uptime_seconds(),
        deployments,
        operations_in_flight: state.orchestrator.operations_in_flight(),
    }))
}
