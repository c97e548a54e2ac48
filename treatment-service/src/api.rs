use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use experiments_common::experiment::{ExperimentId, ExperimentType};
use experiments_common::project::ProjectId;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TreatmentPayload {
    pub name: String,
    pub configuration: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TreatmentMetadata {
    pub experiment_version: i64,
    pub experiment_type: ExperimentType,
    pub switchback_window_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SelectedTreatment {
    pub experiment_id: ExperimentId,
    pub experiment_name: String,
    pub treatment: TreatmentPayload,
    pub metadata: TreatmentMetadata,
}

/// `data` is `null` when no experiment applies to the request.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FetchTreatmentResponse {
    pub data: Option<SelectedTreatment>,
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("no Pass-Key header in request")]
    NoPassKey,
    #[error("Pass-Key is not valid for project {0}")]
    PassKeyValidation(ProjectId),
    #[error("project {0} not found")]
    ProjectNotFound(ProjectId),
    #[error("failed to decode request: {0}")]
    RequestDecoding(String),
    #[error("failed to parse request: {0}")]
    RequestParsing(#[from] serde_json::Error),
    #[error("randomization key {0} is missing from the request")]
    MissingRandomizationKey(String),
    #[error("ambiguous experiment selection for experiment {0}")]
    AssignmentAmbiguity(ExperimentId),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for FetchError {
    fn into_response(self) -> Response {
        let status = match &self {
            FetchError::NoPassKey | FetchError::PassKeyValidation(_) => StatusCode::UNAUTHORIZED,
            FetchError::ProjectNotFound(_) => StatusCode::NOT_FOUND,
            FetchError::RequestDecoding(_)
            | FetchError::RequestParsing(_)
            | FetchError::MissingRandomizationKey(_) => StatusCode::BAD_REQUEST,
            FetchError::AssignmentAmbiguity(_) | FetchError::Internal(_) => {
                tracing::error!("failed to fetch treatment: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
