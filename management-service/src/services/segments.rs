use chrono::Utc;
use serde::Deserialize;

use experiments_common::project::ProjectId;
use experiments_common::segment::SegmentSpec;
use experiments_common::treatment::Segment;
use experiments_common::validation::ValidationError;

use crate::api::ApiError;
use crate::history::HistoryEntry;
use crate::pagination::{Page, PageParams};
use crate::services::{require_settings, ManagementService};
use crate::store::ProjectState;
use crate::validation::{check_name, validate_segment};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSegmentRequest {
    pub name: String,
    pub segment: SegmentSpec,
    #[serde(default)]
    pub updated_by: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSegmentRequest {
    pub segment: SegmentSpec,
    #[serde(default)]
    pub updated_by: String,
}

fn segment_not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("segment {id}"))
}

impl ManagementService {
    fn check_segment(&self, state: &ProjectState, segment: &SegmentSpec) -> Result<SegmentSpec, ApiError> {
        let settings = require_settings(state)?;
        Ok(validate_segment(
            segment,
            &settings.segmenters.names,
            &state.catalog(),
            self.s2_levels,
        )?)
    }

    pub async fn create_segment(
        &self,
        project_id: ProjectId,
        request: CreateSegmentRequest,
    ) -> Result<Segment, ApiError> {
        let mut state = self.project(project_id).await?;
        let mut errors = ValidationError::new();
        check_name(&mut errors, "name", &request.name);
        errors.into_result()?;
        if state.segments.values().any(|s| s.name == request.name) {
            return Err(ApiError::Conflict(format!(
                "segment {} already exists",
                request.name
            )));
        }
        let spec = self.check_segment(&state, &request.segment)?;

        let now = Utc::now();
        let segment = Segment {
            id: self.store.next_id(),
            project_id,
            name: request.name,
            segment: spec,
            version: 1,
            updated_by: request.updated_by,
            created_at: now,
            updated_at: now,
        };
        state.segments.insert(segment.id, segment.clone());
        self.publish(&mut state, "segment_create").await?;
        Ok(segment)
    }

    pub async fn update_segment(
        &self,
        project_id: ProjectId,
        id: i64,
        request: UpdateSegmentRequest,
    ) -> Result<Segment, ApiError> {
        let mut state = self.project(project_id).await?;
        let current = state
            .segments
            .get(&id)
            .cloned()
            .ok_or_else(|| segment_not_found(id))?;
        let spec = self.check_segment(&state, &request.segment)?;

        let updated = Segment {
            segment: spec,
            version: current.version + 1,
            updated_by: request.updated_by,
            updated_at: Utc::now(),
            ..current.clone()
        };
        state
            .segment_history
            .entry(id)
            .or_default()
            .record(current.version, current);
        state.segments.insert(id, updated.clone());
        self.publish(&mut state, "segment_update").await?;
        Ok(updated)
    }

    pub async fn get_segment(&self, project_id: ProjectId, id: i64) -> Result<Segment, ApiError> {
        let state = self.project(project_id).await?;
        state
            .segments
            .get(&id)
            .cloned()
            .ok_or_else(|| segment_not_found(id))
    }

    /// One page of the project's segments, by id.
    pub async fn list_segments(
        &self,
        project_id: ProjectId,
        page: PageParams,
    ) -> Result<Page<Segment>, ApiError> {
        let state = self.project(project_id).await?;
        Ok(page.paginate(state.segments.values().cloned().collect())?)
    }

    pub async fn delete_segment(&self, project_id: ProjectId, id: i64) -> Result<(), ApiError> {
        let mut state = self.project(project_id).await?;
        state.segments.remove(&id).ok_or_else(|| segment_not_found(id))?;
        state.segment_history.remove(&id);
        self.publish(&mut state, "segment_delete").await?;
        Ok(())
    }

    pub async fn segment_history(
        &self,
        project_id: ProjectId,
        id: i64,
    ) -> Result<Vec<HistoryEntry<Segment>>, ApiError> {
        let state = self.project(project_id).await?;
        if !state.segments.contains_key(&id) {
            return Err(segment_not_found(id));
        }
        Ok(state
            .segment_history
            .get(&id)
            .map(|h| h.list())
            .unwrap_or_default())
    }

    pub async fn segment_version(
        &self,
        project_id: ProjectId,
        id: i64,
        version: i64,
    ) -> Result<HistoryEntry<Segment>, ApiError> {
        let state = self.project(project_id).await?;
        state
            .segment_history
            .get(&id)
            .and_then(|h| h.get(version))
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("segment {id} version {version}")))
    }
}
