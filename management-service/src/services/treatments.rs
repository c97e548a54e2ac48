use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use experiments_common::project::ProjectId;
use experiments_common::treatment::Treatment;
use experiments_common::validation::ValidationError;

use crate::api::ApiError;
use crate::history::HistoryEntry;
use crate::pagination::{Page, PageParams};
use crate::services::ManagementService;
use crate::validation::check_name;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTreatmentRequest {
    pub name: String,
    #[serde(default)]
    pub configuration: Value,
    #[serde(default)]
    pub updated_by: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTreatmentRequest {
    #[serde(default)]
    pub configuration: Value,
    #[serde(default)]
    pub updated_by: String,
}

fn treatment_not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("treatment {id}"))
}

fn check_configuration(configuration: &Value) -> Result<(), ValidationError> {
    if configuration.is_object() {
        Ok(())
    } else {
        Err(ValidationError::single("configuration must be a JSON object"))
    }
}

impl ManagementService {
    pub async fn create_treatment(
        &self,
        project_id: ProjectId,
        request: CreateTreatmentRequest,
    ) -> Result<Treatment, ApiError> {
        let mut state = self.store.lock_or_create(project_id).await;
        let mut errors = ValidationError::new();
        check_name(&mut errors, "name", &request.name);
        errors.into_result()?;
        check_configuration(&request.configuration)?;
        if state.treatments.values().any(|t| t.name == request.name) {
            return Err(ApiError::Conflict(format!(
                "treatment {} already exists",
                request.name
            )));
        }

        let now = Utc::now();
        let treatment = Treatment {
            id: self.store.next_id(),
            project_id,
            name: request.name,
            configuration: request.configuration,
            version: 1,
            updated_by: request.updated_by,
            created_at: now,
            updated_at: now,
        };
        state.treatments.insert(treatment.id, treatment.clone());
        self.publish(&mut state, "treatment_create").await?;
        Ok(treatment)
    }

    pub async fn update_treatment(
        &self,
        project_id: ProjectId,
        id: i64,
        request: UpdateTreatmentRequest,
    ) -> Result<Treatment, ApiError> {
        let mut state = self.project(project_id).await?;
        let current = state
            .treatments
            .get(&id)
            .cloned()
            .ok_or_else(|| treatment_not_found(id))?;
        check_configuration(&request.configuration)?;

        let updated = Treatment {
            configuration: request.configuration,
            version: current.version + 1,
            updated_by: request.updated_by,
            updated_at: Utc::now(),
            ..current.clone()
        };
        state
            .treatment_history
            .entry(id)
            .or_default()
            .record(current.version, current);
        state.treatments.insert(id, updated.clone());
        self.publish(&mut state, "treatment_update").await?;
        Ok(updated)
    }

    pub async fn get_treatment(&self, project_id: ProjectId, id: i64) -> Result<Treatment, ApiError> {
        let state = self.project(project_id).await?;
        state
            .treatments
            .get(&id)
            .cloned()
            .ok_or_else(|| treatment_not_found(id))
    }

    /// One page of the project's treatments, by id.
    pub async fn list_treatments(
        &self,
        project_id: ProjectId,
        page: PageParams,
    ) -> Result<Page<Treatment>, ApiError> {
        let state = self.project(project_id).await?;
        Ok(page.paginate(state.treatments.values().cloned().collect())?)
    }

    pub async fn delete_treatment(&self, project_id: ProjectId, id: i64) -> Result<(), ApiError> {
        let mut state = self.project(project_id).await?;
        state
            .treatments
            .remove(&id)
            .ok_or_else(|| treatment_not_found(id))?;
        state.treatment_history.remove(&id);
        self.publish(&mut state, "treatment_delete").await?;
        Ok(())
    }

    pub async fn treatment_history(
        &self,
        project_id: ProjectId,
        id: i64,
    ) -> Result<Vec<HistoryEntry<Treatment>>, ApiError> {
        let state = self.project(project_id).await?;
        if !state.treatments.contains_key(&id) {
            return Err(treatment_not_found(id));
        }
        Ok(state
            .treatment_history
            .get(&id)
            .map(|h| h.list())
            .unwrap_or_default())
    }

    pub async fn treatment_version(
        &self,
        project_id: ProjectId,
        id: i64,
        version: i64,
    ) -> Result<HistoryEntry<Treatment>, ApiError> {
        let state = self.project(project_id).await?;
        state
            .treatment_history
            .get(&id)
            .and_then(|h| h.get(version))
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("treatment {id} version {version}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{service, PROJECT_ID};
    use serde_json::json;

    fn request(name: &str, configuration: Value) -> CreateTreatmentRequest {
        CreateTreatmentRequest {
            name: name.to_string(),
            configuration,
            updated_by: "alice".to_string(),
        }
    }

    #[tokio::test]
    async fn test_treatment_lifecycle() {
        let (service, _publisher) = service();
        let created = service
            .create_treatment(PROJECT_ID, request("surge-pricing", json!({"multiplier": 1.5})))
            .await
            .unwrap();

        let updated = service
            .update_treatment(
                PROJECT_ID,
                created.id,
                UpdateTreatmentRequest {
                    configuration: json!({"multiplier": 2.0}),
                    updated_by: "bob".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.name, "surge-pricing");

        let history = service.treatment_history(PROJECT_ID, created.id).await.unwrap();
        assert_eq!(history[0].snapshot.configuration, json!({"multiplier": 1.5}));
        assert!(service.treatment_version(PROJECT_ID, created.id, 2).await.is_err());

        service.delete_treatment(PROJECT_ID, created.id).await.unwrap();
        assert!(matches!(
            service.get_treatment(PROJECT_ID, created.id).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_names_are_unique_and_configuration_is_an_object() {
        let (service, _publisher) = service();
        service
            .create_treatment(PROJECT_ID, request("surge-pricing", json!({})))
            .await
            .unwrap();
        assert!(matches!(
            service
                .create_treatment(PROJECT_ID, request("surge-pricing", json!({})))
                .await,
            Err(ApiError::Conflict(_))
        ));
        assert!(matches!(
            service.create_treatment(PROJECT_ID, request("flat-pricing", json!(3))).await,
            Err(ApiError::Validation(_))
        ));
        let page = service
            .list_treatments(PROJECT_ID, PageParams::default())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
    }
}
