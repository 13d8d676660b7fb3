//! Artifact API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracker_core::{
    AddOutcome, Artifact, ArtifactFilter, Dispatched, TrackerError, ValidationReport,
};

use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListArtifactsParams {
    #[serde(default)]
    pub processor: Option<String>,
    #[serde(default)]
    pub only_roots: bool,
}

#[derive(Debug, Serialize)]
pub struct ArtifactListResponse {
    pub artifacts: Vec<Artifact>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct AddArtifactRequest {
    pub id: String,
    pub processor: String,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub config: serde_json::Value,
    /// Register as root. Defaults to true for explicit registration.
    #[serde(default = "default_root")]
    pub root: bool,
}

fn default_root() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct AddArtifactResponse {
    pub outcome: &'static str,
    pub message: String,
    pub artifact: Artifact,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<Dispatched>,
}

#[derive(Debug, Deserialize)]
pub struct ArtifactRef {
    pub processor: String,
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub message: String,
    pub dispatch: Dispatched,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(err: TrackerError) -> ApiError {
    let status = match &err {
        TrackerError::NotFound(_) => StatusCode::NOT_FOUND,
        TrackerError::UnknownProcessor(_) => StatusCode::BAD_REQUEST,
        TrackerError::DispatchFailure { .. } => StatusCode::SERVICE_UNAVAILABLE,
        TrackerError::OperationFailure(_) | TrackerError::Catalog(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

fn require_key(processor: &str, id: &str) -> Result<(), ApiError> {
    if processor.trim().is_empty() {
        return Err(bad_request("processor cannot be empty"));
    }
    if id.trim().is_empty() {
        return Err(bad_request("id cannot be empty"));
    }
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/artifacts
///
/// List artifacts, optionally by processor and only roots.
pub async fn list_artifacts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListArtifactsParams>,
) -> Result<Json<ArtifactListResponse>, ApiError> {
    let mut filter = ArtifactFilter::new().only_roots(params.only_roots);
    if let Some(processor) = params.processor {
        filter = filter.with_processor(processor);
    }

    match state.tracker().list_artifacts(&filter).await {
        Ok(artifacts) => {
            let total = artifacts.len();
            Ok(Json(ArtifactListResponse { artifacts, total }))
        }
        Err(e) => Err(error_response(e)),
    }
}

/// GET /api/v1/artifacts/{processor}/{id}
pub async fn get_artifact(
    State(state): State<Arc<AppState>>,
    Path((processor, id)): Path<(String, String)>,
) -> Result<Json<Artifact>, ApiError> {
    state
        .tracker()
        .get_artifact(&processor, &id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /api/v1/artifacts
///
/// Register an artifact. 201 when created, 200 when promoted or already known.
pub async fn add_artifact(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddArtifactRequest>,
) -> Result<(StatusCode, Json<AddArtifactResponse>), ApiError> {
    require_key(&request.processor, &request.id)?;

    let candidate = Artifact::new(&request.id, &request.processor, request.root)
        .with_filter(request.filter.filter(|f| !f.is_empty()))
        .with_config(request.config);

    let outcome = state
        .tracker()
        .add_artifact(candidate)
        .await
        .map_err(error_response)?;
    info!("{}", outcome.message());

    let message = outcome.message();
    let (status, name, artifact, dispatch) = match outcome {
        AddOutcome::Added {
            artifact,
            dispatched,
        } => (StatusCode::CREATED, "added", artifact, Some(dispatched)),
        AddOutcome::Promoted {
            artifact,
            dispatched,
        } => (StatusCode::OK, "promoted", artifact, Some(dispatched)),
        AddOutcome::AlreadyExists(artifact) => (StatusCode::OK, "already_exists", artifact, None),
    };

    Ok((
        status,
        Json(AddArtifactResponse {
            outcome: name,
            message,
            artifact,
            dispatch,
        }),
    ))
}

/// POST /api/v1/artifacts/track
///
/// Re-collect one artifact. 202 when queued, 200 when collected inline.
pub async fn track_artifact(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ArtifactRef>,
) -> Result<(StatusCode, Json<TrackResponse>), ApiError> {
    require_key(&request.processor, &request.id)?;

    let dispatch = state
        .tracker()
        .track(&request.processor, &request.id)
        .await
        .map_err(error_response)?;

    let status = match dispatch {
        Dispatched::Collected { .. } => StatusCode::OK,
        Dispatched::Queued { .. } => StatusCode::ACCEPTED,
    };
    Ok((
        status,
        Json(TrackResponse {
            message: format!("Tracking {}/{}", request.processor, request.id),
            dispatch,
        }),
    ))
}

/// POST /api/v1/artifacts/track/all
///
/// Start a re-track sweep and return without waiting for it.
pub async fn track_all(State(state): State<Arc<AppState>>) -> (StatusCode, Json<SuccessResponse>) {
    // The sweep runs detached; its result is logged by the scheduler.
    drop(state.scheduler().trigger());
    (
        StatusCode::ACCEPTED,
        Json(SuccessResponse {
            message: "Re-track sweep started".to_string(),
        }),
    )
}

/// POST /api/v1/artifacts/validate/all
pub async fn validate_all(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ValidationReport>, ApiError> {
    state
        .tracker()
        .validate()
        .await
        .map(Json)
        .map_err(error_response)
}

/// DELETE /api/v1/artifacts/{processor}/{id}
pub async fn delete_artifact(
    State(state): State<Arc<AppState>>,
    Path((processor, id)): Path<(String, String)>,
) -> Result<Json<Artifact>, ApiError> {
    state
        .tracker()
        .delete_artifact(&processor, &id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /api/v1/artifacts/collect
///
/// Collect inline, creating the artifact if it is unknown.
pub async fn collect_artifact(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ArtifactRef>,
) -> Result<Json<Artifact>, ApiError> {
    require_key(&request.processor, &request.id)?;

    state
        .tracker()
        .collect(&request.processor, &request.id)
        .await
        .map(Json)
        .map_err(error_response)
}
