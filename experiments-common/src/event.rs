use serde::{Deserialize, Serialize};

use crate::experiment::Experiment;
use crate::project::{ProjectId, ProjectSettings};
use crate::segmenter::SegmenterDescriptor;

/// Everything the treatment path needs to serve one project.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProjectConfig {
    pub settings: ProjectSettings,
    /// Descriptors for the segmenters the project can use, globals included.
    pub segmenters: Vec<SegmenterDescriptor>,
    pub experiments: Vec<Experiment>,
}

/// A full configuration snapshot for one project. Consumers keep the one
/// with the highest revision.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConfigEvent {
    pub project_id: ProjectId,
    pub revision: u64,
    pub snapshot: ProjectConfig,
}
