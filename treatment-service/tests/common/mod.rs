#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use experiments_common::event::{ConfigEvent, ProjectConfig};
use experiments_common::experiment::{
    Experiment, ExperimentStatus, ExperimentTier, ExperimentTreatment, ExperimentType,
};
use experiments_common::project::{ProjectSegmenters, ProjectSettings};
use experiments_common::segment::SegmentSpec;
use treatment_service::cache::ConfigCache;
use treatment_service::config::Config;
use treatment_service::server::serve_with_cache;
use treatment_service::time::FixedTime;

pub const PROJECT_ID: i64 = 1;
pub const PASS_KEY: &str = "abc123";

pub static DEFAULT_CONFIG: Lazy<Config> = Lazy::new(Config::default_test_config);

pub struct ServerHandle {
    pub addr: SocketAddr,
    pub cache: Arc<ConfigCache>,
    pub clock: FixedTime,
    client: reqwest::Client,
    shutdown: Arc<Notify>,
}

impl ServerHandle {
    pub async fn for_config(config: Config, now: DateTime<Utc>) -> ServerHandle {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let notify = Arc::new(Notify::new());
        let shutdown = notify.clone();
        let cache = Arc::new(ConfigCache::new());
        let clock = FixedTime::new(now);

        let (server_cache, server_clock) = (cache.clone(), clock.clone());
        tokio::spawn(async move {
            serve_with_cache(config, server_cache, server_clock, listener, async move {
                notify.notified().await
            })
            .await
        });
        ServerHandle {
            addr,
            cache,
            clock,
            client: reqwest::Client::new(),
            shutdown,
        }
    }

    pub async fn fetch(&self, project_id: i64, pass_key: Option<&str>, body: Value) -> reqwest::Response {
        let mut request = self
            .client
            .post(format!(
                "http://{:?}/v1/projects/{}/fetch-treatment",
                self.addr, project_id
            ))
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string());
        if let Some(key) = pass_key {
            request = request.header("Pass-Key", key);
        }
        request.send().await.expect("failed to send request")
    }

    pub async fn fetch_data(&self, body: Value) -> Value {
        let res = self.fetch(PROJECT_ID, Some(PASS_KEY), body).await;
        assert_eq!(reqwest::StatusCode::OK, res.status());
        res.json::<Value>().await.unwrap()["data"].clone()
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown.notify_one()
    }
}

pub fn settings(segmenters: &[&str]) -> ProjectSettings {
    let now = Utc::now();
    ProjectSettings {
        project_id: PROJECT_ID,
        username: "client".to_string(),
        randomization_key: "session_id".to_string(),
        passkey: PASS_KEY.to_string(),
        segmenters: ProjectSegmenters {
            names: segmenters.iter().map(|s| s.to_string()).collect(),
            variables: Default::default(),
        },
        default_timezone: None,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

pub fn ab_experiment(id: i64, segment: SegmentSpec, traffic: [u32; 2], now: DateTime<Utc>) -> Experiment {
    Experiment {
        id,
        project_id: PROJECT_ID,
        name: format!("experiment-{id}"),
        description: None,
        experiment_type: ExperimentType::AB,
        interval: None,
        tier: ExperimentTier::Default,
        treatments: vec![
            ExperimentTreatment {
                name: "control".to_string(),
                configuration: json!({"variant": "control"}),
                traffic: Some(traffic[0]),
            },
            ExperimentTreatment {
                name: "treatment".to_string(),
                configuration: json!({"variant": "treatment"}),
                traffic: Some(traffic[1]),
            },
        ],
        segment,
        status: ExperimentStatus::Active,
        start_time: now - Duration::hours(1),
        end_time: now + Duration::days(1),
        version: 1,
        updated_by: "tester".to_string(),
        created_at: now,
        updated_at: now,
    }
}

pub fn config_event(revision: u64, segmenters: &[&str], experiments: Vec<Experiment>) -> ConfigEvent {
    ConfigEvent {
        project_id: PROJECT_ID,
        revision,
        snapshot: ProjectConfig {
            settings: settings(segmenters),
            segmenters: vec![],
            experiments,
        },
    }
}
