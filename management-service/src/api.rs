use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use experiments_common::propagation::PropagationError;
use experiments_common::validation::ValidationError;

use crate::orthogonality::OrthogonalityError;
use crate::pagination::{Page, Paging};

/// Every successful response is wrapped in `data`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Json<DataResponse<T>> {
        Json(DataResponse { data })
    }
}

/// A page of a list, with `paging` next to `data`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PagedResponse<T> {
    pub data: Vec<T>,
    pub paging: Paging,
}

impl<T> PagedResponse<T> {
    pub fn new(page: Page<T>) -> Json<PagedResponse<T>> {
        Json(PagedResponse {
            data: page.items,
            paging: page.paging,
        })
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Orthogonality(#[from] OrthogonalityError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("failed to parse request: {0}")]
    RequestParsing(#[from] serde_json::Error),
    #[error("change saved but could not be propagated: {0}")]
    Propagation(#[from] PropagationError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) | ApiError::Orthogonality(_) | ApiError::RequestParsing(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Propagation(_) => {
                tracing::error!("{}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = match &self {
            ApiError::Validation(e) => json!({ "error": self.to_string(), "problems": e.problems }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

/// Decodes a JSON body, reporting failures the same way as every other error.
pub fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                ApiError::Validation(ValidationError::single("bad")),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Orthogonality(OrthogonalityError { first: 1, second: 2 }),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::NotFound("experiment 3".to_string()), StatusCode::NOT_FOUND),
            (ApiError::Conflict("taken".to_string()), StatusCode::CONFLICT),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_parse_body_reports_bad_json() {
        let result: Result<serde_json::Value, ApiError> = parse_body(&Bytes::from_static(b"{"));
        assert!(matches!(result, Err(ApiError::RequestParsing(_))));
    }
}
