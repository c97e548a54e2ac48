use chrono::Utc;
use serde::{Deserialize, Serialize};

use experiments_common::project::{ProjectId, ProjectSegmenters, ProjectSettings};
use experiments_common::validation::ValidationError;

use crate::api::ApiError;
use crate::history::HistoryEntry;
use crate::orthogonality::validate_segmenter_change;
use crate::services::{require_settings, ManagementService};
use crate::validation::validate_settings;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSettingsRequest {
    pub username: String,
    pub randomization_key: String,
    pub passkey: String,
    pub segmenters: ProjectSegmenters,
    #[serde(default)]
    pub default_timezone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSettingsRequest {
    pub randomization_key: String,
    pub segmenters: ProjectSegmenters,
    #[serde(default)]
    pub default_timezone: Option<String>,
}

/// Request fields a caller supplies for one enabled segmenter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExperimentVariables {
    pub name: String,
    pub fields: Vec<String>,
}

impl ManagementService {
    pub async fn create_settings(
        &self,
        project_id: ProjectId,
        request: CreateSettingsRequest,
    ) -> Result<ProjectSettings, ApiError> {
        let mut state = self.store.lock_or_create(project_id).await;
        if state.settings.is_some() {
            return Err(ApiError::Conflict(format!(
                "settings for project {project_id} already exist"
            )));
        }
        if request.passkey.is_empty() {
            return Err(ValidationError::single("passkey must not be empty").into());
        }
        validate_settings(
            &request.randomization_key,
            &request.segmenters,
            request.default_timezone.as_deref(),
            &state.catalog(),
        )?;

        let now = Utc::now();
        let settings = ProjectSettings {
            project_id,
            username: request.username,
            randomization_key: request.randomization_key,
            passkey: request.passkey,
            segmenters: request.segmenters,
            default_timezone: request.default_timezone,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        state.settings = Some(settings.clone());
        self.publish(&mut state, "settings_create").await?;
        Ok(settings)
    }

    /// Replaces the segmenter selection, randomization key and timezone.
    /// Rejected as a whole when the new selection would make two live
    /// experiments overlap.
    pub async fn update_settings(
        &self,
        project_id: ProjectId,
        request: UpdateSettingsRequest,
    ) -> Result<ProjectSettings, ApiError> {
        let mut state = self.project(project_id).await?;
        let current = require_settings(&state)?.clone();

        validate_settings(
            &request.randomization_key,
            &request.segmenters,
            request.default_timezone.as_deref(),
            &state.catalog(),
        )?;
        validate_segmenter_change(
            &current.segmenters.names,
            &request.segmenters.names,
            &state.experiment_list(),
            Utc::now(),
        )?;

        let updated = ProjectSettings {
            randomization_key: request.randomization_key,
            segmenters: request.segmenters,
            default_timezone: request.default_timezone,
            version: current.version + 1,
            updated_at: Utc::now(),
            ..current.clone()
        };
        state.settings_history.record(current.version, current);
        state.settings = Some(updated.clone());
        self.publish(&mut state, "settings_update").await?;
        Ok(updated)
    }

    pub async fn get_settings(&self, project_id: ProjectId) -> Result<ProjectSettings, ApiError> {
        let state = self.project(project_id).await?;
        require_settings(&state).cloned()
    }

    pub async fn settings_history(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<HistoryEntry<ProjectSettings>>, ApiError> {
        let state = self.project(project_id).await?;
        require_settings(&state)?;
        Ok(state.settings_history.list())
    }

    /// Every project that has settings, by id.
    pub async fn list_projects(&self) -> Vec<ProjectSettings> {
        let mut projects = Vec::new();
        for project_id in self.store.project_ids() {
            let Some(state) = self.store.lock(project_id).await else {
                continue;
            };
            if let Some(settings) = &state.settings {
                projects.push(settings.clone());
            }
        }
        projects
    }

    /// The request fields each enabled segmenter reads, in priority order.
    pub async fn experiment_variables(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<ExperimentVariables>, ApiError> {
        let state = self.project(project_id).await?;
        let settings = require_settings(&state)?;
        let catalog = state.catalog();

        let variables = settings
            .segmenters
            .names
            .iter()
            .map(|name| {
                let fields = match settings.segmenters.variables.get(name) {
                    Some(fields) => fields.clone(),
                    None => catalog
                        .iter()
                        .find(|s| &s.name == name)
                        .map(|s| s.treatment_request_fields())
                        .unwrap_or_default(),
                };
                ExperimentVariables {
                    name: name.clone(),
                    fields,
                }
            })
            .collect();
        Ok(variables)
    }
}
