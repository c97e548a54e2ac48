use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use crate::event::ConfigEvent;

#[derive(Error, Debug)]
pub enum PropagationError {
    #[error("failed to publish configuration for project {project_id}: {reason}")]
    PublishFailed { project_id: i64, reason: String },
}

/// Seam between committed configuration changes and whatever carries them
/// to treatment servers.
#[async_trait]
pub trait ConfigPublisher: Send + Sync {
    async fn publish(&self, event: ConfigEvent) -> Result<(), PropagationError>;
}

/// In-process transport backed by a tokio broadcast channel.
#[derive(Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<ConfigEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        BroadcastPublisher { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl ConfigPublisher for BroadcastPublisher {
    async fn publish(&self, event: ConfigEvent) -> Result<(), PropagationError> {
        let project_id = event.project_id;
        let revision = event.revision;
        // No subscribers is fine: pollers pick the snapshot up on their own.
        if self.sender.send(event).is_err() {
            debug!(project_id, revision, "no subscribers for configuration event");
        }
        Ok(())
    }
}

/// Drops events after logging them. Used when treatment servers poll.
pub struct LoggingPublisher;

#[async_trait]
impl ConfigPublisher for LoggingPublisher {
    async fn publish(&self, event: ConfigEvent) -> Result<(), PropagationError> {
        debug!(
            project_id = event.project_id,
            revision = event.revision,
            "configuration committed"
        );
        Ok(())
    }
}
