use serde::{Deserialize, Serialize};

use experiments_common::project::ProjectId;
use experiments_common::segmenter::{is_global_segmenter, SegmenterDescriptor};
use experiments_common::validation::ValidationError;
use experiments_common::value::{SegmenterType, SegmenterValue};

use crate::api::ApiError;
use crate::services::ManagementService;
use crate::store::ProjectState;
use crate::validation::validate_custom_segmenter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmenterStatus {
    Active,
    Inactive,
}

/// A segmenter as listed to clients: its descriptor, the fields a treatment
/// request must carry for it and whether the project has it enabled.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SegmenterView {
    #[serde(flatten)]
    pub descriptor: SegmenterDescriptor,
    pub treatment_request_fields: Vec<String>,
    pub status: SegmenterStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSegmenterRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub segmenter_type: SegmenterType,
    /// Defaults to a single field named after the segmenter.
    #[serde(default)]
    pub options: Option<Vec<Vec<String>>>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub multi_valued: bool,
    #[serde(default)]
    pub constraints: Option<Vec<SegmenterValue>>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSegmenterRequest {
    #[serde(rename = "type")]
    pub segmenter_type: SegmenterType,
    #[serde(default)]
    pub options: Option<Vec<Vec<String>>>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub multi_valued: bool,
    #[serde(default)]
    pub constraints: Option<Vec<SegmenterValue>>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ProjectState {
    fn segmenter_view(&self, descriptor: SegmenterDescriptor) -> SegmenterView {
        let enabled = self
            .settings
            .as_ref()
            .is_some_and(|s| s.segmenters.names.contains(&descriptor.name));
        SegmenterView {
            treatment_request_fields: descriptor.treatment_request_fields(),
            status: if enabled {
                SegmenterStatus::Active
            } else {
                SegmenterStatus::Inactive
            },
            descriptor,
        }
    }

    fn segmenter_views(&self) -> Vec<SegmenterView> {
        self.catalog()
            .into_iter()
            .map(|descriptor| self.segmenter_view(descriptor))
            .collect()
    }

    fn is_enabled(&self, name: &str) -> bool {
        self.settings
            .as_ref()
            .is_some_and(|s| s.segmenters.names.iter().any(|n| n == name))
    }

    fn is_referenced(&self, name: &str, active_only: bool) -> bool {
        self.experiments
            .values()
            .filter(|e| !active_only || e.is_active())
            .any(|e| e.segment.constraint(name).is_some())
            || (!active_only
                && self
                    .segments
                    .values()
                    .any(|s| s.segment.constraint(name).is_some()))
    }
}

fn custom_not_found(name: &str) -> ApiError {
    ApiError::NotFound(format!("segmenter {name}"))
}

impl ManagementService {
    /// Projects that do not exist yet still see the global segmenters.
    pub async fn list_segmenters(&self, project_id: ProjectId) -> Vec<SegmenterView> {
        match self.store.lock(project_id).await {
            Some(state) => state.segmenter_views(),
            None => ProjectState::new(project_id).segmenter_views(),
        }
    }

    pub async fn get_segmenter(
        &self,
        project_id: ProjectId,
        name: &str,
    ) -> Result<SegmenterView, ApiError> {
        self.list_segmenters(project_id)
            .await
            .into_iter()
            .find(|view| view.descriptor.name == name)
            .ok_or_else(|| custom_not_found(name))
    }

    pub async fn create_segmenter(
        &self,
        project_id: ProjectId,
        request: CreateSegmenterRequest,
    ) -> Result<SegmenterView, ApiError> {
        let mut state = self.store.lock_or_create(project_id).await;
        if state.segmenters.contains_key(&request.name) {
            return Err(ApiError::Conflict(format!(
                "segmenter {} already exists",
                request.name
            )));
        }

        let descriptor = SegmenterDescriptor {
            options: request
                .options
                .unwrap_or_else(|| vec![vec![request.name.clone()]]),
            required: request.required,
            multi_valued: request.multi_valued,
            constraints: request.constraints,
            description: request.description,
            ..SegmenterDescriptor::custom(&request.name, request.segmenter_type)
        };
        validate_custom_segmenter(&descriptor)?;

        state
            .segmenters
            .insert(descriptor.name.clone(), descriptor.clone());
        self.publish(&mut state, "segmenter_create").await?;
        Ok(state.segmenter_view(descriptor))
    }

    /// A segmenter referenced by an experiment or a segment keeps its type.
    pub async fn update_segmenter(
        &self,
        project_id: ProjectId,
        name: &str,
        request: UpdateSegmenterRequest,
    ) -> Result<SegmenterView, ApiError> {
        let mut state = self.project(project_id).await?;
        if is_global_segmenter(name) {
            return Err(ValidationError::single(format!("segmenter {name} cannot be modified")).into());
        }
        let current = state
            .segmenters
            .get(name)
            .cloned()
            .ok_or_else(|| custom_not_found(name))?;

        if current.segmenter_type != request.segmenter_type && state.is_referenced(name, false) {
            return Err(ValidationError::single(format!(
                "segmenter {name} is in use and cannot change type"
            ))
            .into());
        }

        let options = request.options.unwrap_or_else(|| current.options.clone());
        let updated = SegmenterDescriptor {
            segmenter_type: request.segmenter_type,
            options,
            required: request.required,
            multi_valued: request.multi_valued,
            constraints: request.constraints,
            description: request.description,
            ..current
        };
        validate_custom_segmenter(&updated)?;

        if let Some(settings) = &state.settings {
            let mut errors = ValidationError::new();
            if let Some(variables) = settings.segmenters.variables.get(name) {
                if !updated.accepts_variables(variables) {
                    errors.push(format!(
                        "the project's variables for segmenter {name} are no longer a valid option"
                    ));
                }
            }
            if updated.required && !settings.segmenters.names.iter().any(|n| n == name) {
                errors.push(format!("segmenter {name} cannot be required while disabled"));
            }
            errors.into_result()?;
        }

        state.segmenters.insert(name.to_string(), updated.clone());
        self.publish(&mut state, "segmenter_update").await?;
        Ok(state.segmenter_view(updated))
    }

    pub async fn delete_segmenter(&self, project_id: ProjectId, name: &str) -> Result<(), ApiError> {
        let mut state = self.project(project_id).await?;
        if is_global_segmenter(name) {
            return Err(ValidationError::single(format!("segmenter {name} cannot be deleted")).into());
        }
        if !state.segmenters.contains_key(name) {
            return Err(custom_not_found(name));
        }

        let mut errors = ValidationError::new();
        if state.is_enabled(name) {
            errors.push(format!("segmenter {name} is enabled in the project settings"));
        }
        if state.is_referenced(name, true) {
            errors.push(format!("segmenter {name} is used by an active experiment"));
        }
        errors.into_result()?;

        state.segmenters.remove(name);
        self.publish(&mut state, "segmenter_delete").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{service, settings_request, PROJECT_ID};
    use experiments_common::segmenter::SegmenterScope;
    use serde_json::json;

    fn country() -> CreateSegmenterRequest {
        serde_json::from_value(json!({
            "name": "country",
            "type": "string",
            "multi_valued": true,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_marks_enabled_segmenters() {
        let (service, _publisher) = service();
        service.create_segmenter(PROJECT_ID, country()).await.unwrap();
        service
            .create_settings(PROJECT_ID, settings_request(&["country", "s2_ids"]))
            .await
            .unwrap();

        let views = service.list_segmenters(PROJECT_ID).await;
        assert_eq!(views.len(), 4);
        let status = |name: &str| views.iter().find(|v| v.descriptor.name == name).map(|v| v.status);
        assert_eq!(status("country"), Some(SegmenterStatus::Active));
        assert_eq!(status("s2_ids"), Some(SegmenterStatus::Active));
        assert_eq!(status("hours_of_day"), Some(SegmenterStatus::Inactive));
        assert_eq!(
            views
                .iter()
                .filter(|v| v.descriptor.scope == SegmenterScope::Global)
                .count(),
            3
        );

        let country = service.get_segmenter(PROJECT_ID, "country").await.unwrap();
        assert_eq!(country.treatment_request_fields, vec!["country"]);
    }

    #[tokio::test]
    async fn test_duplicate_and_reserved_names() {
        let (service, _publisher) = service();
        service.create_segmenter(PROJECT_ID, country()).await.unwrap();
        assert!(matches!(
            service.create_segmenter(PROJECT_ID, country()).await,
            Err(ApiError::Conflict(_))
        ));

        let mut reserved = country();
        reserved.name = "days_of_week".to_string();
        assert!(matches!(
            service.create_segmenter(PROJECT_ID, reserved).await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_enabled_segmenter_cannot_be_deleted() {
        let (service, _publisher) = service();
        service.create_segmenter(PROJECT_ID, country()).await.unwrap();
        service
            .create_settings(PROJECT_ID, settings_request(&["country"]))
            .await
            .unwrap();

        assert!(matches!(
            service.delete_segmenter(PROJECT_ID, "country").await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            service.delete_segmenter(PROJECT_ID, "s2_ids").await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            service.delete_segmenter(PROJECT_ID, "missing").await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_changes_options() {
        let (service, _publisher) = service();
        service.create_segmenter(PROJECT_ID, country()).await.unwrap();

        let request: UpdateSegmenterRequest = serde_json::from_value(json!({
            "type": "string",
            "options": [["country_code"], ["country"]],
            "multi_valued": true,
        }))
        .unwrap();
        let view = service
            .update_segmenter(PROJECT_ID, "country", request)
            .await
            .unwrap();
        assert_eq!(view.treatment_request_fields, vec!["country_code", "country"]);

        service.delete_segmenter(PROJECT_ID, "country").await.unwrap();
        assert!(service.get_segmenter(PROJECT_ID, "country").await.is_err());
    }
}
