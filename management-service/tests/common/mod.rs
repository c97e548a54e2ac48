#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use experiments_common::event::ConfigEvent;
use experiments_common::propagation::{BroadcastPublisher, ConfigPublisher, PropagationError};
use management_service::config::Config;
use management_service::server::serve;

pub const PROJECT_ID: i64 = 1;
pub const PASS_KEY: &str = "abc123";

pub static DEFAULT_CONFIG: Lazy<Config> = Lazy::new(Config::default_test_config);

pub struct ServerHandle {
    pub addr: SocketAddr,
    pub publisher: BroadcastPublisher,
    client: reqwest::Client,
    shutdown: Arc<Notify>,
}

/// Publishes nowhere and fails while `failing` is set.
#[derive(Default)]
pub struct FlakyPublisher {
    pub failing: AtomicBool,
}

#[async_trait]
impl ConfigPublisher for FlakyPublisher {
    async fn publish(&self, event: ConfigEvent) -> Result<(), PropagationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PropagationError::PublishFailed {
                project_id: event.project_id,
                reason: "transport unavailable".to_string(),
            });
        }
        Ok(())
    }
}

impl ServerHandle {
    pub async fn for_config(config: Config) -> ServerHandle {
        let publisher = BroadcastPublisher::new(64);
        Self::start(config, Arc::new(publisher.clone()), publisher).await
    }

    /// Server whose committed changes go to `server_publisher` only.
    pub async fn for_publisher(config: Config, server_publisher: Arc<dyn ConfigPublisher>) -> ServerHandle {
        Self::start(config, server_publisher, BroadcastPublisher::new(1)).await
    }

    async fn start(
        config: Config,
        server_publisher: Arc<dyn ConfigPublisher>,
        publisher: BroadcastPublisher,
    ) -> ServerHandle {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let notify = Arc::new(Notify::new());
        let shutdown = notify.clone();

        tokio::spawn(async move {
            serve(config, server_publisher, listener, async move {
                notify.notified().await
            })
            .await
        });
        ServerHandle {
            addr,
            publisher,
            client: reqwest::Client::new(),
            shutdown,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{:?}{}", self.addr, path)
    }

    pub async fn send(&self, method: reqwest::Method, path: &str, body: Option<Value>) -> reqwest::Response {
        let mut request = self.client.request(method, self.url(path));
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }
        request.send().await.expect("failed to send request")
    }

    /// Sends a request expected to succeed and returns its `data`.
    pub async fn data(&self, method: reqwest::Method, path: &str, body: Option<Value>) -> Value {
        let res = self.send(method, path, body).await;
        assert_eq!(reqwest::StatusCode::OK, res.status());
        res.json::<Value>().await.unwrap()["data"].clone()
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown.notify_one()
    }
}

pub fn settings_body(segmenters: &[&str]) -> Value {
    json!({
        "username": "client",
        "randomization_key": "session_id",
        "passkey": PASS_KEY,
        "segmenters": {"names": segmenters},
    })
}

pub fn country_segmenter() -> Value {
    json!({"name": "country", "type": "string", "multi_valued": true})
}

/// An A/B experiment running from an hour ago for a week.
pub fn ab_experiment_body(name: &str, segment: Value, traffic: [u32; 2]) -> Value {
    let now = Utc::now();
    json!({
        "name": name,
        "type": "A/B",
        "treatments": [
            {"name": "control", "configuration": {"variant": "control"}, "traffic": traffic[0]},
            {"name": "treatment", "configuration": {"variant": "treatment"}, "traffic": traffic[1]},
        ],
        "segment": segment,
        "start_time": now - Duration::hours(1),
        "end_time": now + Duration::days(7),
        "updated_by": "tester",
    })
}
