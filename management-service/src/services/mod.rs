use std::sync::Arc;

use tokio::sync::OwnedMutexGuard;
use tracing::info;

use experiments_common::event::ConfigEvent;
use experiments_common::project::{ProjectId, ProjectSettings};
use experiments_common::propagation::ConfigPublisher;

use crate::api::ApiError;
use crate::store::{ProjectState, Store};
use crate::validation::S2Levels;

pub mod experiments;
pub mod projects;
pub mod segmenters;
pub mod segments;
pub mod treatments;

/// Owns every project's configuration. Each mutation runs validate, commit,
/// history and publish while holding the project's lock.
pub struct ManagementService {
    store: Store,
    publisher: Arc<dyn ConfigPublisher>,
    s2_levels: S2Levels,
}

impl ManagementService {
    pub fn new(publisher: Arc<dyn ConfigPublisher>, s2_levels: S2Levels) -> Self {
        ManagementService {
            store: Store::new(),
            publisher,
            s2_levels,
        }
    }

    /// Locks a project that exists. Reads never create one.
    async fn project(&self, project_id: ProjectId) -> Result<OwnedMutexGuard<ProjectState>, ApiError> {
        self.store
            .lock(project_id)
            .await
            .ok_or_else(|| ApiError::NotFound(format!("project {project_id}")))
    }

    /// The latest full configuration of a project, as pulled by pollers.
    pub async fn snapshot(&self, project_id: ProjectId) -> Result<ConfigEvent, ApiError> {
        let state = self.project(project_id).await?;
        let snapshot = state.config().ok_or_else(|| not_configured(project_id))?;
        Ok(ConfigEvent {
            project_id,
            revision: state.revision,
            snapshot,
        })
    }

    /// Bumps the revision and sends the project's full configuration.
    /// Called with the project's lock held, after the change is committed.
    async fn publish(&self, state: &mut ProjectState, mutation: &'static str) -> Result<(), ApiError> {
        let labels = [("mutation", mutation.to_string())];
        metrics::counter!("management_mutations_total", &labels).increment(1);

        // Nothing can be served before settings exist.
        let Some(snapshot) = state.config() else {
            return Ok(());
        };
        state.revision += 1;
        info!(
            project_id = state.project_id,
            revision = state.revision,
            mutation,
            "publishing configuration"
        );
        self.publisher
            .publish(ConfigEvent {
                project_id: state.project_id,
                revision: state.revision,
                snapshot,
            })
            .await?;
        Ok(())
    }
}

fn not_configured(project_id: ProjectId) -> ApiError {
    ApiError::NotFound(format!("settings for project {project_id}"))
}

/// Settings of a project that must already be set up.
fn require_settings(state: &ProjectState) -> Result<&ProjectSettings, ApiError> {
    state
        .settings
        .as_ref()
        .ok_or_else(|| not_configured(state.project_id))
}


#[cfg(test)]
mod tests {
    use super::test_support::{settings_request, PROJECT_ID};
    use super::*;
    use async_trait::async_trait;
    use experiments_common::propagation::PropagationError;

    struct UnreachablePublisher;

    #[async_trait]
    impl ConfigPublisher for UnreachablePublisher {
        async fn publish(&self, event: ConfigEvent) -> Result<(), PropagationError> {
            Err(PropagationError::PublishFailed {
                project_id: event.project_id,
                reason: "connection refused".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_failed_publish_keeps_the_committed_change() {
        let service = ManagementService::new(
            Arc::new(UnreachablePublisher),
            S2Levels { min: 10, max: 14 },
        );

        let err = service
            .create_settings(PROJECT_ID, settings_request(&["days_of_week"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Propagation(_)));

        let settings = service.get_settings(PROJECT_ID).await.unwrap();
        assert_eq!(settings.version, 1);
        let snapshot = service.snapshot(PROJECT_ID).await.unwrap();
        assert_eq!(snapshot.revision, 1);
        assert_eq!(snapshot.snapshot.settings, settings);
    }

    #[tokio::test]
    async fn test_reads_do_not_create_projects() {
        let (service, _publisher) = test_support::service();
        for project_id in 1..=20 {
            assert!(matches!(
                service.get_settings(project_id).await,
                Err(ApiError::NotFound(_))
            ));
            assert!(service.snapshot(project_id).await.is_err());
            assert!(service.experiment_variables(project_id).await.is_err());
            assert!(!service.list_segmenters(project_id).await.is_empty());
        }
        assert!(service.store.project_ids().is_empty());
        assert!(service.list_projects().await.is_empty());
    }
}
