use anyhow::Result;
use assert_json_diff::assert_json_include;
use chrono::{Duration, TimeZone, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};

use experiments_common::experiment::{ExperimentStatus, ExperimentTreatment, ExperimentType};
use experiments_common::segment::SegmentSpec;
use experiments_common::value::SegmenterValue;

use crate::common::*;
mod common;

const LEVEL_14_CELL: i64 = 3592210809859604480;
const LEVEL_14_SIBLING: i64 = 3592210818449539072;
const LEVEL_10_CELL: i64 = 3592211140572086272;

#[tokio::test]
async fn it_returns_the_matching_treatment() -> Result<()> {
    let now = Utc::now();
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone(), now).await;
    server.cache.apply(config_event(
        1,
        &["days_of_week"],
        vec![ab_experiment(7, SegmentSpec::new(), [0, 100], now)],
    ));

    let res = server
        .fetch(PROJECT_ID, Some(PASS_KEY), json!({"session_id": "user-1"}))
        .await;
    assert_eq!(StatusCode::OK, res.status());

    let json_data = res.json::<Value>().await?;
    assert_json_include!(
        actual: json_data,
        expected: json!({
            "data": {
                "experiment_id": 7,
                "experiment_name": "experiment-7",
                "treatment": {
                    "name": "treatment",
                    "configuration": {"variant": "treatment"},
                    "traffic": 100
                },
                "metadata": {
                    "experiment_version": 1,
                    "experiment_type": "A/B",
                    "switchback_window_id": null
                }
            }
        })
    );

    Ok(())
}

#[tokio::test]
async fn it_returns_null_data_when_nothing_matches() -> Result<()> {
    let now = Utc::now();
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone(), now).await;
    server.cache.apply(config_event(
        1,
        &["s2_ids"],
        vec![ab_experiment(
            1,
            SegmentSpec::new().with("s2_ids", vec![SegmenterValue::Integer(LEVEL_14_CELL)]),
            [50, 50],
            now,
        )],
    ));

    let data = server
        .fetch_data(json!({"session_id": "user-1", "s2id": LEVEL_14_SIBLING}))
        .await;
    assert_eq!(data, Value::Null);

    // No location at all cannot satisfy a constrained segmenter either.
    let data = server.fetch_data(json!({"session_id": "user-1"})).await;
    assert_eq!(data, Value::Null);

    Ok(())
}

#[tokio::test]
async fn it_rejects_bad_requests() -> Result<()> {
    let now = Utc::now();
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone(), now).await;
    server.cache.apply(config_event(1, &[], vec![]));

    let res = server.fetch(PROJECT_ID, None, json!({"session_id": "a"})).await;
    assert_eq!(StatusCode::UNAUTHORIZED, res.status());

    let res = server
        .fetch(PROJECT_ID, Some("wrong"), json!({"session_id": "a"}))
        .await;
    assert_eq!(StatusCode::UNAUTHORIZED, res.status());

    let res = server.fetch(99, Some(PASS_KEY), json!({"session_id": "a"})).await;
    assert_eq!(StatusCode::NOT_FOUND, res.status());

    let res = server.fetch(PROJECT_ID, Some(PASS_KEY), json!({"other": "a"})).await;
    assert_eq!(StatusCode::BAD_REQUEST, res.status());
    let body = res.json::<Value>().await?;
    assert_eq!(
        body["error"],
        json!("randomization key session_id is missing from the request")
    );

    let res = server.fetch(PROJECT_ID, Some(PASS_KEY), json!(["a"])).await;
    assert_eq!(StatusCode::BAD_REQUEST, res.status());

    Ok(())
}

#[tokio::test]
async fn it_splits_traffic_by_weight() -> Result<()> {
    let now = Utc::now();
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone(), now).await;
    server.cache.apply(config_event(
        1,
        &[],
        vec![ab_experiment(3, SegmentSpec::new(), [30, 70], now)],
    ));

    let mut control = 0;
    for i in 0..2000 {
        let data = server
            .fetch_data(json!({"session_id": format!("session-{i}")}))
            .await;
        if data["treatment"]["name"] == "control" {
            control += 1;
        }
    }
    assert!((540..=660).contains(&control), "control = {control}");

    // Same key, same answer, also after the snapshot is rebuilt.
    let before = server.fetch_data(json!({"session_id": "sticky"})).await;
    server.cache.apply(config_event(
        2,
        &[],
        vec![ab_experiment(3, SegmentSpec::new(), [30, 70], now)],
    ));
    let after = server.fetch_data(json!({"session_id": "sticky"})).await;
    assert_eq!(before["treatment"], after["treatment"]);

    Ok(())
}

#[tokio::test]
async fn it_rotates_switchback_treatments() -> Result<()> {
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone(), start).await;

    let mut experiment = ab_experiment(11, SegmentSpec::new(), [0, 0], start);
    experiment.experiment_type = ExperimentType::Switchback;
    experiment.interval = Some(30);
    experiment.start_time = start;
    experiment.treatments = ["a", "b", "c"]
        .iter()
        .map(|name| ExperimentTreatment {
            name: name.to_string(),
            configuration: json!({}),
            traffic: None,
        })
        .collect();
    server.cache.apply(config_event(1, &[], vec![experiment]));

    let mut seen = vec![];
    for minute in [0, 10, 29, 30, 65, 90] {
        server.clock.set(start + Duration::minutes(minute));
        let data = server
            .fetch_data(json!({"session_id": format!("s{minute}")}))
            .await;
        seen.push((
            data["treatment"]["name"].as_str().unwrap_or_default().to_string(),
            data["metadata"]["switchback_window_id"].as_i64(),
        ));
    }

    let expected = [
        ("a", 0),
        ("a", 0),
        ("a", 0),
        ("b", 1),
        ("c", 2),
        ("a", 3),
    ];
    for ((name, window), (want_name, want_window)) in seen.iter().zip(expected) {
        assert_eq!(name, want_name);
        assert_eq!(*window, Some(want_window));
    }

    Ok(())
}

#[tokio::test]
async fn it_prefers_the_most_granular_cell() -> Result<()> {
    let now = Utc::now();
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone(), now).await;
    let granular = ab_experiment(
        20,
        SegmentSpec::new().with("s2_ids", vec![SegmenterValue::Integer(LEVEL_14_CELL)]),
        [50, 50],
        now,
    );
    let coarse = ab_experiment(
        10,
        SegmentSpec::new().with("s2_ids", vec![SegmenterValue::Integer(LEVEL_10_CELL)]),
        [50, 50],
        now,
    );
    server
        .cache
        .apply(config_event(1, &["s2_ids"], vec![coarse, granular]));

    let inside = server
        .fetch_data(json!({
            "session_id": "a",
            "latitude": 1.2537040223936706,
            "longitude": 103.8998991137485
        }))
        .await;
    assert_eq!(inside["experiment_id"], 20);

    let outside = server
        .fetch_data(json!({"session_id": "a", "s2id": LEVEL_14_SIBLING}))
        .await;
    assert_eq!(outside["experiment_id"], 10);

    Ok(())
}

#[tokio::test]
async fn it_stops_serving_disabled_experiments() -> Result<()> {
    let now = Utc::now();
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone(), now).await;
    let experiment = ab_experiment(5, SegmentSpec::new(), [50, 50], now);
    server
        .cache
        .apply(config_event(1, &[], vec![experiment.clone()]));
    assert_eq!(
        server.fetch_data(json!({"session_id": "a"})).await["experiment_id"],
        5
    );

    let mut disabled = experiment.clone();
    disabled.status = ExperimentStatus::Inactive;
    server.cache.apply(config_event(2, &[], vec![disabled]));
    assert_eq!(server.fetch_data(json!({"session_id": "a"})).await, Value::Null);

    // A late duplicate of the old snapshot must not bring it back.
    server
        .cache
        .apply(config_event(1, &[], vec![experiment.clone()]));
    assert_eq!(server.fetch_data(json!({"session_id": "a"})).await, Value::Null);

    server.cache.apply(config_event(3, &[], vec![experiment]));
    assert_eq!(
        server.fetch_data(json!({"session_id": "a"})).await["experiment_id"],
        5
    );

    Ok(())
}
