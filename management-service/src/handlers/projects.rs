use axum::extract::{Path, State};
use axum::Json;
use bytes::Bytes;
use tracing::instrument;

use experiments_common::event::ConfigEvent;
use experiments_common::project::{ProjectId, ProjectSettings};

use crate::api::{parse_body, ApiError, DataResponse};
use crate::handlers::AppState;
use crate::history::HistoryEntry;
use crate::services::projects::ExperimentVariables;

pub async fn list(State(service): State<AppState>) -> Json<DataResponse<Vec<ProjectSettings>>> {
    DataResponse::new(service.list_projects().await)
}

#[instrument(skip_all, fields(project_id))]
pub async fn create_settings(
    State(service): State<AppState>,
    Path(project_id): Path<ProjectId>,
    body: Bytes,
) -> Result<Json<DataResponse<ProjectSettings>>, ApiError> {
    tracing::Span::current().record("project_id", project_id);
    let request = parse_body(&body)?;
    Ok(DataResponse::new(service.create_settings(project_id, request).await?))
}

#[instrument(skip_all, fields(project_id))]
pub async fn update_settings(
    State(service): State<AppState>,
    Path(project_id): Path<ProjectId>,
    body: Bytes,
) -> Result<Json<DataResponse<ProjectSettings>>, ApiError> {
    tracing::Span::current().record("project_id", project_id);
    let request = parse_body(&body)?;
    Ok(DataResponse::new(service.update_settings(project_id, request).await?))
}

pub async fn get_settings(
    State(service): State<AppState>,
    Path(project_id): Path<ProjectId>,
) -> Result<Json<DataResponse<ProjectSettings>>, ApiError> {
    Ok(DataResponse::new(service.get_settings(project_id).await?))
}

pub async fn settings_history(
    State(service): State<AppState>,
    Path(project_id): Path<ProjectId>,
) -> Result<Json<DataResponse<Vec<HistoryEntry<ProjectSettings>>>>, ApiError> {
    Ok(DataResponse::new(service.settings_history(project_id).await?))
}

pub async fn experiment_variables(
    State(service): State<AppState>,
    Path(project_id): Path<ProjectId>,
) -> Result<Json<DataResponse<Vec<ExperimentVariables>>>, ApiError> {
    Ok(DataResponse::new(service.experiment_variables(project_id).await?))
}

/// Full configuration pulled by treatment service pollers. Not wrapped in `data`.
pub async fn snapshot(
    State(service): State<AppState>,
    Path(project_id): Path<ProjectId>,
) -> Result<Json<ConfigEvent>, ApiError> {
    Ok(Json(service.snapshot(project_id).await?))
}
