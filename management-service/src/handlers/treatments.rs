use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;
use tracing::instrument;

use experiments_common::project::ProjectId;
use experiments_common::treatment::Treatment;

use crate::api::{parse_body, ApiError, DataResponse, PagedResponse};
use crate::handlers::AppState;
use crate::history::HistoryEntry;
use crate::pagination::PageParams;

pub async fn list(
    State(service): State<AppState>,
    Path(project_id): Path<ProjectId>,
    Query(page): Query<PageParams>,
) -> Result<Json<PagedResponse<Treatment>>, ApiError> {
    Ok(PagedResponse::new(service.list_treatments(project_id, page).await?))
}

pub async fn get(
    State(service): State<AppState>,
    Path((project_id, id)): Path<(ProjectId, i64)>,
) -> Result<Json<DataResponse<Treatment>>, ApiError> {
    Ok(DataResponse::new(service.get_treatment(project_id, id).await?))
}

#[instrument(skip_all, fields(project_id))]
pub async fn create(
    State(service): State<AppState>,
    Path(project_id): Path<ProjectId>,
    body: Bytes,
) -> Result<Json<DataResponse<Treatment>>, ApiError> {
    tracing::Span::current().record("project_id", project_id);
    let request = parse_body(&body)?;
    Ok(DataResponse::new(service.create_treatment(project_id, request).await?))
}

#[instrument(skip_all, fields(project_id, treatment_id))]
pub async fn update(
    State(service): State<AppState>,
    Path((project_id, id)): Path<(ProjectId, i64)>,
    body: Bytes,
) -> Result<Json<DataResponse<Treatment>>, ApiError> {
    tracing::Span::current().record("project_id", project_id);
    tracing::Span::current().record("treatment_id", id);
    let request = parse_body(&body)?;
    Ok(DataResponse::new(
        service.update_treatment(project_id, id, request).await?,
    ))
}

#[instrument(skip_all, fields(project_id, treatment_id))]
pub async fn delete(
    State(service): State<AppState>,
    Path((project_id, id)): Path<(ProjectId, i64)>,
) -> Result<StatusCode, ApiError> {
    tracing::Span::current().record("project_id", project_id);
    tracing::Span::current().record("treatment_id", id);
    service.delete_treatment(project_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn history(
    State(service): State<AppState>,
    Path((project_id, id)): Path<(ProjectId, i64)>,
) -> Result<Json<DataResponse<Vec<HistoryEntry<Treatment>>>>, ApiError> {
    Ok(DataResponse::new(service.treatment_history(project_id, id).await?))
}

pub async fn version(
    State(service): State<AppState>,
    Path((project_id, id, version)): Path<(ProjectId, i64, i64)>,
) -> Result<Json<DataResponse<HistoryEntry<Treatment>>>, ApiError> {
    Ok(DataResponse::new(
        service.treatment_version(project_id, id, version).await?,
    ))
}
