use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::project::ProjectId;
use crate::segment::SegmentSpec;

/// A reusable, named treatment configuration, independent of experiments.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Treatment {
    pub id: i64,
    pub project_id: ProjectId,
    pub name: String,
    pub configuration: Value,
    pub version: i64,
    #[serde(default)]
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A reusable, named segment that experiments can copy their segment from.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Segment {
    pub id: i64,
    pub project_id: ProjectId,
    pub name: String,
    pub segment: SegmentSpec,
    pub version: i64,
    #[serde(default)]
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
