//! Deployment lifecycle handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use canopy_types::{DeploymentName, DeploymentState, FailureRecord, ProviderConfig};
use serde::{Deserialize, Serialize};

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct CreateDeploymentPayload {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDeploymentPayload {
    pub content: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeploymentSummaryResponse {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeploymentListResponse {
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeploymentDetailResponse {
    pub id: String,
    pub url: Option<String>,
    pub state: DeploymentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<FailureRecord>,
}

fn parse_name(id: &str) -> Result<DeploymentName, ApiError> {
    DeploymentName::new(id).map_err(|err| ApiError::BadRequest(format!("invalid id: {err}")))
}

/// Per-request provider override; `None` keeps the process defaults.
fn override_provider(
    state: &AppState,
    provider: Option<String>,
    region: Option<String>,
) -> Option<ProviderConfig> {
    if provider.is_none() && region.is_none() {
        return None;
    }
    let defaults = state.orchestrator.provider();
    Some(ProviderConfig::new(
        provider.unwrap_or_else(|| defaults.provider.clone()),
        region.unwrap_or_else(|| defaults.region.clone()),
    ))
}

pub async fn create_deployment(
    State(state): State<AppState>,
    Json(payload): Json<CreateDeploymentPayload>,
) -> ApiResult<(StatusCode, Json<DeploymentSummaryResponse>)> {
    let name = parse_name(&payload.id)?;
    let provider = override_provider(&state, payload.provider, payload.region);
    let deployment = state
        .orchestrator
        .create(&name, &payload.content, provider)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(DeploymentSummaryResponse {
            id: name.to_string(),
            url: deployment.url().map(str::to_string),
        }),
    ))
}

pub async fn list_deployments(
    State(state): State<AppState>,
) -> ApiResult<Json<DeploymentListResponse>> {
    let ids = state
        .orchestrator
        .list()
        .await?
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    Ok(Json(DeploymentListResponse { ids }))
}

pub async fn get_deployment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeploymentDetailResponse>> {
    let name = parse_name(&id)?;
    let deployment = state.orchestrator.get(&name).await?;
    Ok(Json(DeploymentDetailResponse {
        id: name.to_string(),
        url: deployment.url().map(str::to_string),
        state: deployment.state,
        last_error: deployment.last_error,
    }))
}

pub async fn update_deployment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateDeploymentPayload>,
) -> ApiResult<Json<DeploymentSummaryResponse>> {
    let name = parse_name(&id)?;
    let provider = override_provider(&state, payload.provider, payload.region);
    let deployment = state
        .orchestrator
        .update(&name, &payload.content, provider)
        .await?;
    Ok(Json(DeploymentSummaryResponse {
        id: name.to_string(),
        url: deployment.url().map(str::to_string),
    }))
}

pub async fn delete_deployment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let name = parse_name(&id)?;
    state.orchestrator.destroy(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
