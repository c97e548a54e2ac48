use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::project::ProjectId;
use crate::segment::SegmentSpec;

pub type ExperimentId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum ExperimentType {
    #[serde(rename = "A/B")]
    AB,
    Switchback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentTier {
    #[default]
    Default,
    Override,
}

impl ExperimentTier {
    /// Higher wins during selection.
    pub fn priority(&self) -> u8 {
        match self {
            ExperimentTier::Default => 0,
            ExperimentTier::Override => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExperimentTreatment {
    pub name: String,
    #[serde(default)]
    pub configuration: Value,
    /// Traffic percentage. Required for A/B, optional for switchback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Experiment {
    pub id: ExperimentId,
    pub project_id: ProjectId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub experiment_type: ExperimentType,
    /// Switchback interval in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
    #[serde(default)]
    pub tier: ExperimentTier,
    pub treatments: Vec<ExperimentTreatment>,
    #[serde(default)]
    pub segment: SegmentSpec,
    pub status: ExperimentStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub version: i64,
    #[serde(default)]
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Experiment {
    pub fn is_active(&self) -> bool {
        self.status == ExperimentStatus::Active
    }

    /// Active and `now` falls in `[start_time, end_time)`.
    pub fn is_running_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.start_time <= now && now < self.end_time
    }

    /// Whether the two experiments' scheduled windows intersect.
    pub fn schedule_overlaps(&self, other: &Experiment) -> bool {
        self.start_time < other.end_time && other.start_time < self.end_time
    }
}
