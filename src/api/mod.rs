//! HTTP surface: admission checks for callers, block management for operators

use crate::blocklist::BlockEntry;
use crate::error::{GatekeeperError, Result};
use crate::rate_limit::{advisory_headers, AdmissionResult, AdmissionState, Rejection};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// Body of `POST /v1/check`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    /// Tool being invoked
    pub operation: String,
    /// JSON-RPC id echoed back on rejection
    #[serde(default)]
    pub id: serde_json::Value,
}

/// Body of `PUT /v1/blocks/:client_id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockRequest {
    pub reason: String,
    /// Omit for a permanent block
    #[serde(default)]
    pub duration_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnblockResponse {
    pub removed: bool,
}

/// Build the admission and administration routes
pub fn router(state: AdmissionState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/check", post(check_handler))
        .route(
            "/v1/blocks/:client_id",
            get(get_block_handler)
                .put(block_handler)
                .delete(unblock_handler),
        )
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "OK"
}

/// Run an admission check for the calling client
pub async fn check_handler(
    State(state): State<AdmissionState>,
    headers: HeaderMap,
    Json(request): Json<CheckRequest>,
) -> Response {
    let client_id = state.identity.client_id(&headers);
    let result: AdmissionResult = state.service.check(&client_id, &request.operation).await;

    match Rejection::new(&result, state.service.now(), request.id) {
        Some(rejection) => rejection.into_response(),
        None => (advisory_headers(&result), Json(result)).into_response(),
    }
}

async fn get_block_handler(
    State(state): State<AdmissionState>,
    Path(client_id): Path<String>,
) -> Result<Json<BlockEntry>> {
    state
        .service
        .is_blocked(&client_id)
        .await?
        .map(Json)
        .ok_or_else(|| GatekeeperError::NotFound(format!("No block for client {}", client_id)))
}

async fn block_handler(
    State(state): State<AdmissionState>,
    Path(client_id): Path<String>,
    Json(request): Json<BlockRequest>,
) -> Result<(StatusCode, Json<BlockEntry>)> {
    if request.reason.trim().is_empty() {
        return Err(GatekeeperError::InvalidRequest(
            "Block reason cannot be empty".to_string(),
        ));
    }
    if request.duration_secs == Some(0) {
        return Err(GatekeeperError::InvalidRequest(
            "Block duration must be > 0".to_string(),
        ));
    }

    let duration = request.duration_secs.map(Duration::from_secs);
    let entry = state
        .service
        .block(&client_id, &request.reason, duration)
        .await?;
    info!(client_id = %client_id, "Client blocked by operator");

    Ok((StatusCode::CREATED, Json(entry)))
}

async fn unblock_handler(
    State(state): State<AdmissionState>,
    Path(client_id): Path<String>,
) -> Result<Json<UnblockResponse>> {
    let removed = state.service.unblock(&client_id).await?;
    Ok(Json(UnblockResponse { removed }))
}
