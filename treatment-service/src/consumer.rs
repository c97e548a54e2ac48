use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use experiments_common::event::ConfigEvent;
use experiments_common::project::ProjectId;

use crate::cache::ConfigCache;

/// Applies events from an in-process broadcast until the sender goes away.
pub async fn consume_events(cache: Arc<ConfigCache>, mut receiver: broadcast::Receiver<ConfigEvent>) {
    loop {
        match receiver.recv().await {
            Ok(event) => {
                cache.apply(event);
            }
            Err(RecvError::Lagged(skipped)) => {
                // Events are full snapshots, the next one received catches up.
                warn!(skipped, "configuration consumer lagged behind");
            }
            Err(RecvError::Closed) => {
                info!("configuration channel closed, stopping consumer");
                return;
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum FetchSnapshotError {
    #[error("request for project {0} snapshot failed: {1}")]
    Request(ProjectId, #[source] reqwest::Error),
    #[error("management service answered {1} for project {0}")]
    Status(ProjectId, reqwest::StatusCode),
}

#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    async fn fetch(&self, project_id: ProjectId) -> Result<ConfigEvent, FetchSnapshotError>;
}

/// Pulls full project snapshots from the management service.
pub struct HttpSnapshotFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSnapshotFetcher {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpSnapshotFetcher {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SnapshotFetcher for HttpSnapshotFetcher {
    async fn fetch(&self, project_id: ProjectId) -> Result<ConfigEvent, FetchSnapshotError> {
        let url = format!(
            "{}/v1/internal/projects/{}/snapshot",
            self.base_url, project_id
        );
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchSnapshotError::Request(project_id, e))?;
        if !response.status().is_success() {
            return Err(FetchSnapshotError::Status(project_id, response.status()));
        }
        response
            .json::<ConfigEvent>()
            .await
            .map_err(|e| FetchSnapshotError::Request(project_id, e))
    }
}

/// Fetches every project once.
pub async fn poll_once(cache: &ConfigCache, fetcher: &dyn SnapshotFetcher, project_ids: &[ProjectId]) {
    for &project_id in project_ids {
        match fetcher.fetch(project_id).await {
            Ok(event) => {
                cache.apply(event);
            }
            Err(e) => warn!(project_id, error = %e, "failed to poll configuration snapshot"),
        }
    }
}

pub async fn poll_snapshots(
    cache: Arc<ConfigCache>,
    fetcher: Arc<dyn SnapshotFetcher>,
    project_ids: Vec<ProjectId>,
    poll_interval: Duration,
) {
    let mut interval = tokio::time::interval(poll_interval);
    loop {
        interval.tick().await;
        poll_once(&cache, fetcher.as_ref(), &project_ids).await;
    }
}
