use axum::extract::{Path, Query, State};
use axum::Json;
use bytes::Bytes;
use tracing::instrument;

use experiments_common::experiment::{Experiment, ExperimentId};
use experiments_common::project::ProjectId;

use crate::api::{parse_body, ApiError, DataResponse, PagedResponse};
use crate::handlers::AppState;
use crate::history::HistoryEntry;
use crate::pagination::PageParams;
use crate::services::experiments::ListExperimentsParams;

pub async fn list(
    State(service): State<AppState>,
    Path(project_id): Path<ProjectId>,
    Query(params): Query<ListExperimentsParams>,
    Query(page): Query<PageParams>,
) -> Result<Json<PagedResponse<Experiment>>, ApiError> {
    Ok(PagedResponse::new(
        service.list_experiments(project_id, &params, page).await?,
    ))
}

pub async fn get(
    State(service): State<AppState>,
    Path((project_id, id)): Path<(ProjectId, ExperimentId)>,
) -> Result<Json<DataResponse<Experiment>>, ApiError> {
    Ok(DataResponse::new(service.get_experiment(project_id, id).await?))
}

#[instrument(skip_all, fields(project_id))]
pub async fn create(
    State(service): State<AppState>,
    Path(project_id): Path<ProjectId>,
    body: Bytes,
) -> Result<Json<DataResponse<Experiment>>, ApiError> {
    tracing::Span::current().record("project_id", project_id);
    let request = parse_body(&body)?;
    let experiment = service.create_experiment(project_id, request).await?;
    tracing::info!(experiment_id = experiment.id, "experiment created");
    Ok(DataResponse::new(experiment))
}

#[instrument(skip_all, fields(project_id, experiment_id))]
pub async fn update(
    State(service): State<AppState>,
    Path((project_id, id)): Path<(ProjectId, ExperimentId)>,
    body: Bytes,
) -> Result<Json<DataResponse<Experiment>>, ApiError> {
    tracing::Span::current().record("project_id", project_id);
    tracing::Span::current().record("experiment_id", id);
    let request = parse_body(&body)?;
    Ok(DataResponse::new(
        service.update_experiment(project_id, id, request).await?,
    ))
}

#[instrument(skip_all, fields(project_id, experiment_id))]
pub async fn enable(
    State(service): State<AppState>,
    Path((project_id, id)): Path<(ProjectId, ExperimentId)>,
) -> Result<Json<DataResponse<Experiment>>, ApiError> {
    tracing::Span::current().record("project_id", project_id);
    tracing::Span::current().record("experiment_id", id);
    Ok(DataResponse::new(service.enable_experiment(project_id, id).await?))
}

#[instrument(skip_all, fields(project_id, experiment_id))]
pub async fn disable(
    State(service): State<AppState>,
    Path((project_id, id)): Path<(ProjectId, ExperimentId)>,
) -> Result<Json<DataResponse<Experiment>>, ApiError> {
    tracing::Span::current().record("project_id", project_id);
    tracing::Span::current().record("experiment_id", id);
    Ok(DataResponse::new(service.disable_experiment(project_id, id).await?))
}

pub async fn history(
    State(service): State<AppState>,
    Path((project_id, id)): Path<(ProjectId, ExperimentId)>,
) -> Result<Json<DataResponse<Vec<HistoryEntry<Experiment>>>>, ApiError> {
    Ok(DataResponse::new(service.experiment_history(project_id, id).await?))
}

pub async fn version(
    State(service): State<AppState>,
    Path((project_id, id, version)): Path<(ProjectId, ExperimentId, i64)>,
) -> Result<Json<DataResponse<HistoryEntry<Experiment>>>, ApiError> {
    Ok(DataResponse::new(
        service.experiment_version(project_id, id, version).await?,
    ))
}
