use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::{Map, Value};
use subtle::ConstantTimeEq;
use tracing::instrument;

use experiments_common::project::ProjectId;

use crate::api::{
    FetchError, FetchTreatmentResponse, SelectedTreatment, TreatmentMetadata, TreatmentPayload,
};
use crate::assignment::assign;
use crate::cache::ProjectSnapshot;
use crate::matching::resolve_filters;
use crate::router;
use crate::segmenters::{RequestContext, Segmenters};
use crate::selection::{select, SelectionError};

pub const PASS_KEY_HEADER: &str = "pass-key";

#[instrument(skip_all, fields(project_id, experiment_id))]
pub async fn fetch_treatment(
    state: State<router::State>,
    Path(project_id): Path<ProjectId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<FetchTreatmentResponse>, FetchError> {
    let start = Instant::now();
    tracing::Span::current().record("project_id", project_id);

    let result = handle(&state, project_id, &headers, &body);

    let outcome = match &result {
        Ok(FetchTreatmentResponse { data: Some(_) }) => "matched",
        Ok(FetchTreatmentResponse { data: None }) => "no_match",
        Err(_) => "error",
    };
    let labels = [("outcome", outcome.to_string())];
    metrics::counter!("treatment_fetch_requests_total", &labels).increment(1);
    metrics::histogram!("treatment_fetch_duration_seconds")
        .record(start.elapsed().as_secs_f64());

    result.map(Json)
}

/// Compares in constant time for keys of equal length.
fn pass_key_matches(expected: &str, given: &str) -> bool {
    expected.as_bytes().ct_eq(given.as_bytes()).into()
}

fn handle(
    state: &router::State,
    project_id: ProjectId,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<FetchTreatmentResponse, FetchError> {
    let pass_key = headers
        .get(PASS_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(FetchError::NoPassKey)?;

    let snapshot = state
        .cache
        .get(project_id)
        .ok_or(FetchError::ProjectNotFound(project_id))?;
    if !pass_key_matches(&snapshot.settings.passkey, pass_key) {
        return Err(FetchError::PassKeyValidation(project_id));
    }

    let attributes = decode_attributes(body)?;
    let now = state.timesource.current_time();
    evaluate(
        &snapshot,
        &state.segmenters,
        state.default_timezone,
        &attributes,
        now,
    )
}

fn decode_attributes(body: &Bytes) -> Result<Map<String, Value>, FetchError> {
    if body.is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body)? {
        Value::Object(map) => Ok(map),
        other => Err(FetchError::RequestDecoding(format!(
            "expected a JSON object, got {}",
            kind(&other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Value of the project's randomization key, rendered as a string.
fn randomization_value(
    snapshot: &ProjectSnapshot,
    attributes: &Map<String, Value>,
) -> Result<String, FetchError> {
    let key = &snapshot.settings.randomization_key;
    match attributes.get(key) {
        None | Some(Value::Null) => Err(FetchError::MissingRandomizationKey(key.clone())),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
    }
}

/// Runs matching, selection and assignment for one request against a
/// project snapshot.
pub fn evaluate(
    snapshot: &ProjectSnapshot,
    segmenters: &Segmenters,
    service_timezone: Tz,
    attributes: &Map<String, Value>,
    now: DateTime<Utc>,
) -> Result<FetchTreatmentResponse, FetchError> {
    let randomization = randomization_value(snapshot, attributes)?;

    let fallback_timezone = snapshot
        .settings
        .default_timezone
        .as_deref()
        .and_then(|name| name.parse::<Tz>().ok())
        .unwrap_or(service_timezone);
    let ctx = RequestContext {
        attributes,
        now,
        fallback_timezone,
    };

    let filters = resolve_filters(&snapshot.settings, &snapshot.segmenters, segmenters, &ctx);
    let selected = select(&snapshot.experiments, &snapshot.segmenters, &filters, now)
        .map_err(|SelectionError::AssignmentAmbiguity(id)| FetchError::AssignmentAmbiguity(id))?;

    let Some(experiment) = selected else {
        metrics::counter!("treatment_fetch_no_match_total").increment(1);
        return Ok(FetchTreatmentResponse { data: None });
    };
    tracing::Span::current().record("experiment_id", experiment.id);

    let assignment =
        assign(experiment, now, &randomization).map_err(|e| FetchError::Internal(e.to_string()))?;

    Ok(FetchTreatmentResponse {
        data: Some(SelectedTreatment {
            experiment_id: experiment.id,
            experiment_name: experiment.name.clone(),
            treatment: TreatmentPayload {
                name: assignment.treatment.name.clone(),
                configuration: assignment.treatment.configuration.clone(),
                traffic: assignment.treatment.traffic,
            },
            metadata: TreatmentMetadata {
                experiment_version: experiment.version,
                experiment_type: experiment.experiment_type,
                switchback_window_id: assignment.switchback_window_id,
            },
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_fixtures::{event, experiment};
    use crate::cache::ConfigCache;
    use experiments_common::segment::SegmentSpec;
    use serde_json::json;

    fn snapshot(experiments: Vec<experiments_common::experiment::Experiment>) -> ProjectSnapshot {
        let cache = ConfigCache::new();
        cache.apply(event(1, &["days_of_week", "hours_of_day"], experiments));
        cache.get(1).unwrap().as_ref().clone()
    }

    #[test]
    fn test_missing_randomization_key() {
        let snapshot = snapshot(vec![experiment(1, SegmentSpec::new())]);
        let segmenters = Segmenters::new(10, 14).unwrap();
        let attributes = json!({"session_id": null});
        let err = evaluate(
            &snapshot,
            &segmenters,
            Tz::UTC,
            attributes.as_object().unwrap(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::MissingRandomizationKey(key) if key == "session_id"));
    }

    #[test]
    fn test_numeric_randomization_values_are_accepted() {
        let snapshot = snapshot(vec![experiment(1, SegmentSpec::new())]);
        let segmenters = Segmenters::new(10, 14).unwrap();
        let attributes = json!({"session_id": 1234});
        let response = evaluate(
            &snapshot,
            &segmenters,
            Tz::UTC,
            attributes.as_object().unwrap(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(response.data.unwrap().experiment_id, 1);
    }

    #[test]
    fn test_time_segment_uses_project_timezone() {
        // 2024-01-03 is a Wednesday. 20:00 UTC is already Thursday in Singapore.
        let now = chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 1, 3, 20, 0, 0).unwrap();
        let mut exp = experiment(1, SegmentSpec::new().with(
            "days_of_week",
            vec![experiments_common::value::SegmenterValue::Integer(4)],
        ));
        exp.start_time = now - chrono::Duration::days(1);
        exp.end_time = now + chrono::Duration::days(1);

        let mut snapshot = snapshot(vec![exp]);
        let segmenters = Segmenters::new(10, 14).unwrap();
        let attributes = json!({"session_id": "s"});

        let response = evaluate(&snapshot, &segmenters, Tz::UTC, attributes.as_object().unwrap(), now)
            .unwrap();
        assert!(response.data.is_none());

        snapshot.settings.default_timezone = Some("Asia/Singapore".to_string());
        let response = evaluate(&snapshot, &segmenters, Tz::UTC, attributes.as_object().unwrap(), now)
            .unwrap();
        assert_eq!(response.data.unwrap().experiment_id, 1);
    }

    #[test]
    fn test_pass_key_comparison() {
        assert!(pass_key_matches("abc123", "abc123"));
        assert!(!pass_key_matches("abc123", "abc124"));
        assert!(!pass_key_matches("abc123", "abc"));
        assert!(!pass_key_matches("abc123", ""));
    }

    #[test]
    fn test_body_must_be_an_object() {
        let err = decode_attributes(&Bytes::from_static(b"[1,2]")).unwrap_err();
        assert!(matches!(err, FetchError::RequestDecoding(_)));
        let err = decode_attributes(&Bytes::from_static(b"{nope")).unwrap_err();
        assert!(matches!(err, FetchError::RequestParsing(_)));
    }
}
