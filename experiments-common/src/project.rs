use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ProjectId = i64;

/// Which segmenters a project enables, in priority order, and which request
/// fields feed each of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProjectSegmenters {
    pub names: Vec<String>,
    #[serde(default)]
    pub variables: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProjectSettings {
    pub project_id: ProjectId,
    pub username: String,
    pub randomization_key: String,
    pub passkey: String,
    pub segmenters: ProjectSegmenters,
    /// IANA timezone used by time segmenters when a request carries none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_timezone: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
