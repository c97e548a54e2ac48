use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use experiments_common::event::{ConfigEvent, ProjectConfig};
use experiments_common::experiment::Experiment;
use experiments_common::project::{ProjectId, ProjectSettings};
use experiments_common::segmenter::{global_segmenters, SegmenterDescriptor};

/// Immutable view of one project's configuration, swapped as a whole.
#[derive(Debug, Clone)]
pub struct ProjectSnapshot {
    pub revision: u64,
    pub settings: ProjectSettings,
    /// Descriptors of the enabled segmenters, in the project's priority order.
    pub segmenters: Vec<SegmenterDescriptor>,
    /// Active experiments only.
    pub experiments: Vec<Experiment>,
}

impl ProjectSnapshot {
    pub fn from_config(revision: u64, config: ProjectConfig) -> Self {
        let ProjectConfig {
            settings,
            segmenters: mut descriptors,
            experiments,
        } = config;
        descriptors.extend(global_segmenters());

        let segmenters = settings
            .segmenters
            .names
            .iter()
            .filter_map(|name| {
                let found = descriptors.iter().find(|d| &d.name == name).cloned();
                if found.is_none() {
                    warn!(
                        project_id = settings.project_id,
                        segmenter = %name,
                        "enabled segmenter has no descriptor, ignoring it"
                    );
                }
                found
            })
            .collect();

        ProjectSnapshot {
            revision,
            segmenters,
            experiments: experiments.into_iter().filter(|e| e.is_active()).collect(),
            settings,
        }
    }

    pub fn segmenter_names(&self) -> Vec<String> {
        self.segmenters.iter().map(|s| s.name.clone()).collect()
    }
}

/// Per-project configuration for the treatment path. Readers clone an `Arc`
/// and never hold a map guard while serving a request.
#[derive(Default)]
pub struct ConfigCache {
    projects: DashMap<ProjectId, Arc<ProjectSnapshot>>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, project_id: ProjectId) -> Option<Arc<ProjectSnapshot>> {
        self.projects.get(&project_id).map(|entry| entry.value().clone())
    }

    pub fn revision(&self, project_id: ProjectId) -> Option<u64> {
        self.projects.get(&project_id).map(|entry| entry.revision)
    }

    /// Installs the event's snapshot unless the cache already holds the same
    /// or a newer revision. Returns whether the snapshot was installed.
    pub fn apply(&self, event: ConfigEvent) -> bool {
        let project_id = event.project_id;
        let revision = event.revision;

        let applied = match self.projects.entry(project_id) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().revision >= revision {
                    false
                } else {
                    occupied.insert(Arc::new(ProjectSnapshot::from_config(
                        revision,
                        event.snapshot,
                    )));
                    true
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(ProjectSnapshot::from_config(
                    revision,
                    event.snapshot,
                )));
                true
            }
        };

        if applied {
            metrics::counter!("config_events_applied_total").increment(1);
            info!(project_id, revision, "applied configuration snapshot");
        } else {
            metrics::counter!("config_events_skipped_total").increment(1);
            debug!(project_id, revision, "skipped stale configuration snapshot");
        }
        applied
    }

    pub fn project_ids(&self) -> Vec<ProjectId> {
        self.projects.iter().map(|entry| *entry.key()).collect()
    }
}
