use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;
use tracing::instrument;

use experiments_common::project::ProjectId;

use crate::api::{parse_body, ApiError, DataResponse};
use crate::handlers::AppState;
use crate::services::segmenters::SegmenterView;

pub async fn list(
    State(service): State<AppState>,
    Path(project_id): Path<ProjectId>,
) -> Json<DataResponse<Vec<SegmenterView>>> {
    DataResponse::new(service.list_segmenters(project_id).await)
}

pub async fn get(
    State(service): State<AppState>,
    Path((project_id, name)): Path<(ProjectId, String)>,
) -> Result<Json<DataResponse<SegmenterView>>, ApiError> {
    Ok(DataResponse::new(service.get_segmenter(project_id, &name).await?))
}

#[instrument(skip_all, fields(project_id))]
pub async fn create(
    State(service): State<AppState>,
    Path(project_id): Path<ProjectId>,
    body: Bytes,
) -> Result<Json<DataResponse<SegmenterView>>, ApiError> {
    tracing::Span::current().record("project_id", project_id);
    let request = parse_body(&body)?;
    Ok(DataResponse::new(service.create_segmenter(project_id, request).await?))
}

#[instrument(skip_all, fields(project_id, name))]
pub async fn update(
    State(service): State<AppState>,
    Path((project_id, name)): Path<(ProjectId, String)>,
    body: Bytes,
) -> Result<Json<DataResponse<SegmenterView>>, ApiError> {
    tracing::Span::current().record("project_id", project_id);
    tracing::Span::current().record("name", name.as_str());
    let request = parse_body(&body)?;
    Ok(DataResponse::new(
        service.update_segmenter(project_id, &name, request).await?,
    ))
}

#[instrument(skip_all, fields(project_id, name))]
pub async fn delete(
    State(service): State<AppState>,
    Path((project_id, name)): Path<(ProjectId, String)>,
) -> Result<StatusCode, ApiError> {
    tracing::Span::current().record("project_id", project_id);
    tracing::Span::current().record("name", name.as_str());
    service.delete_segmenter(project_id, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}
