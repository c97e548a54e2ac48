use chrono::{DateTime, Utc};
use serde::Deserialize;

use experiments_common::experiment::{
    Experiment, ExperimentId, ExperimentStatus, ExperimentTier, ExperimentTreatment, ExperimentType,
};
use experiments_common::project::ProjectId;
use experiments_common::segment::SegmentSpec;

use crate::api::ApiError;
use crate::history::HistoryEntry;
use crate::pagination::{Page, PageParams};
use crate::orthogonality;
use crate::services::{require_settings, ManagementService};
use crate::store::ProjectState;
use crate::validation::{validate_experiment, validate_segment};

fn default_status() -> ExperimentStatus {
    ExperimentStatus::Active
}

/// Body of both create and update. Updating replaces every field.
#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub experiment_type: ExperimentType,
    #[serde(default)]
    pub interval: Option<u32>,
    #[serde(default)]
    pub tier: ExperimentTier,
    pub treatments: Vec<ExperimentTreatment>,
    #[serde(default)]
    pub segment: SegmentSpec,
    #[serde(default = "default_status")]
    pub status: ExperimentStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub updated_by: String,
}

/// Filters for listing experiments. `start_time`/`end_time` keep experiments
/// whose schedule intersects the given window.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListExperimentsParams {
    pub status: Option<ExperimentStatus>,
    pub tier: Option<ExperimentTier>,
    #[serde(rename = "type")]
    pub experiment_type: Option<ExperimentType>,
    pub name: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl ListExperimentsParams {
    fn matches(&self, experiment: &Experiment) -> bool {
        self.status.map_or(true, |s| experiment.status == s)
            && self.tier.map_or(true, |t| experiment.tier == t)
            && self.experiment_type.map_or(true, |t| experiment.experiment_type == t)
            && self.name.as_ref().map_or(true, |n| {
                experiment.name.to_lowercase().contains(&n.to_lowercase())
            })
            && self.start_time.map_or(true, |start| experiment.end_time > start)
            && self.end_time.map_or(true, |end| experiment.start_time < end)
    }
}

fn experiment_not_found(id: ExperimentId) -> ApiError {
    ApiError::NotFound(format!("experiment {id}"))
}

impl ManagementService {
    /// Field checks, segment typing and the orthogonality check against the
    /// project's other experiments.
    fn check_experiment(&self, state: &ProjectState, experiment: &mut Experiment) -> Result<(), ApiError> {
        let settings = require_settings(state)?;
        validate_experiment(experiment)?;
        experiment.segment = validate_segment(
            &experiment.segment,
            &settings.segmenters.names,
            &state.catalog(),
            self.s2_levels,
        )?;
        orthogonality::validate_experiment(
            experiment,
            &state.experiment_list(),
            &settings.segmenters.names,
            Utc::now(),
        )?;
        Ok(())
    }

    fn check_unique_name(state: &ProjectState, name: &str, id: Option<ExperimentId>) -> Result<(), ApiError> {
        if state
            .experiments
            .values()
            .any(|e| e.name == name && Some(e.id) != id)
        {
            return Err(ApiError::Conflict(format!("experiment {name} already exists")));
        }
        Ok(())
    }

    pub async fn create_experiment(
        &self,
        project_id: ProjectId,
        request: ExperimentRequest,
    ) -> Result<Experiment, ApiError> {
        let mut state = self.project(project_id).await?;
        Self::check_unique_name(&state, &request.name, None)?;

        let now = Utc::now();
        let mut experiment = Experiment {
            id: self.store.next_id(),
            project_id,
            name: request.name,
            description: request.description,
            experiment_type: request.experiment_type,
            interval: request.interval,
            tier: request.tier,
            treatments: request.treatments,
            segment: request.segment,
            status: request.status,
            start_time: request.start_time,
            end_time: request.end_time,
            version: 1,
            updated_by: request.updated_by,
            created_at: now,
            updated_at: now,
        };
        self.check_experiment(&state, &mut experiment)?;

        state.experiments.insert(experiment.id, experiment.clone());
        self.publish(&mut state, "experiment_create").await?;
        Ok(experiment)
    }

    pub async fn update_experiment(
        &self,
        project_id: ProjectId,
        id: ExperimentId,
        request: ExperimentRequest,
    ) -> Result<Experiment, ApiError> {
        let mut state = self.project(project_id).await?;
        let current = state
            .experiments
            .get(&id)
            .cloned()
            .ok_or_else(|| experiment_not_found(id))?;
        Self::check_unique_name(&state, &request.name, Some(id))?;

        let mut updated = Experiment {
            name: request.name,
            description: request.description,
            experiment_type: request.experiment_type,
            interval: request.interval,
            tier: request.tier,
            treatments: request.treatments,
            segment: request.segment,
            status: request.status,
            start_time: request.start_time,
            end_time: request.end_time,
            version: current.version + 1,
            updated_by: request.updated_by,
            updated_at: Utc::now(),
            ..current.clone()
        };
        self.check_experiment(&state, &mut updated)?;

        self.commit_experiment(&mut state, current, updated, "experiment_update")
            .await
    }

    pub async fn enable_experiment(
        &self,
        project_id: ProjectId,
        id: ExperimentId,
    ) -> Result<Experiment, ApiError> {
        self.set_status(project_id, id, ExperimentStatus::Active).await
    }

    pub async fn disable_experiment(
        &self,
        project_id: ProjectId,
        id: ExperimentId,
    ) -> Result<Experiment, ApiError> {
        self.set_status(project_id, id, ExperimentStatus::Inactive).await
    }

    async fn set_status(
        &self,
        project_id: ProjectId,
        id: ExperimentId,
        status: ExperimentStatus,
    ) -> Result<Experiment, ApiError> {
        let mut state = self.project(project_id).await?;
        let current = state
            .experiments
            .get(&id)
            .cloned()
            .ok_or_else(|| experiment_not_found(id))?;
        if current.status == status {
            return Ok(current);
        }

        let updated = Experiment {
            status,
            version: current.version + 1,
            updated_at: Utc::now(),
            ..current.clone()
        };
        if status == ExperimentStatus::Active {
            let settings = require_settings(&state)?;
            orthogonality::validate_experiment(
                &updated,
                &state.experiment_list(),
                &settings.segmenters.names,
                Utc::now(),
            )?;
        }

        let mutation = match status {
            ExperimentStatus::Active => "experiment_enable",
            ExperimentStatus::Inactive => "experiment_disable",
        };
        self.commit_experiment(&mut state, current, updated, mutation)
            .await
    }

    /// Stores `updated`, keeping `previous` in the experiment's history.
    async fn commit_experiment(
        &self,
        state: &mut ProjectState,
        previous: Experiment,
        updated: Experiment,
        mutation: &'static str,
    ) -> Result<Experiment, ApiError> {
        state
            .experiment_history
            .entry(previous.id)
            .or_default()
            .record(previous.version, previous);
        state.experiments.insert(updated.id, updated.clone());
        self.publish(state, mutation).await?;
        Ok(updated)
    }

    pub async fn get_experiment(
        &self,
        project_id: ProjectId,
        id: ExperimentId,
    ) -> Result<Experiment, ApiError> {
        let state = self.project(project_id).await?;
        state
            .experiments
            .get(&id)
            .cloned()
            .ok_or_else(|| experiment_not_found(id))
    }

    pub async fn list_experiments(
        &self,
        project_id: ProjectId,
        params: &ListExperimentsParams,
        page: PageParams,
    ) -> Result<Page<Experiment>, ApiError> {
        let state = self.project(project_id).await?;
        let matching = state
            .experiments
            .values()
            .filter(|e| params.matches(e))
            .cloned()
            .collect();
        Ok(page.paginate(matching)?)
    }

    pub async fn experiment_history(
        &self,
        project_id: ProjectId,
        id: ExperimentId,
    ) -> Result<Vec<HistoryEntry<Experiment>>, ApiError> {
        let state = self.project(project_id).await?;
        if !state.experiments.contains_key(&id) {
            return Err(experiment_not_found(id));
        }
        Ok(state
            .experiment_history
            .get(&id)
            .map(|h| h.list())
            .unwrap_or_default())
    }

    pub async fn experiment_version(
        &self,
        project_id: ProjectId,
        id: ExperimentId,
        version: i64,
    ) -> Result<HistoryEntry<Experiment>, ApiError> {
        let state = self.project(project_id).await?;
        state
            .experiment_history
            .get(&id)
            .and_then(|h| h.get(version))
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("experiment {id} version {version}")))
    }
}
