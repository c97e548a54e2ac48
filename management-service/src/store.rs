use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use experiments_common::event::ProjectConfig;
use experiments_common::experiment::{Experiment, ExperimentId};
use experiments_common::project::{ProjectId, ProjectSettings};
use experiments_common::segmenter::{global_segmenters, SegmenterDescriptor};
use experiments_common::treatment::{Segment, Treatment};

use crate::history::History;

/// Everything the management service holds for one project.
#[derive(Debug)]
pub struct ProjectState {
    pub project_id: ProjectId,
    pub settings: Option<ProjectSettings>,
    pub settings_history: History<ProjectSettings>,
    /// Custom segmenters, by name.
    pub segmenters: BTreeMap<String, SegmenterDescriptor>,
    pub segments: BTreeMap<i64, Segment>,
    pub segment_history: HashMap<i64, History<Segment>>,
    pub treatments: BTreeMap<i64, Treatment>,
    pub treatment_history: HashMap<i64, History<Treatment>>,
    pub experiments: BTreeMap<ExperimentId, Experiment>,
    pub experiment_history: HashMap<ExperimentId, History<Experiment>>,
    /// Last published configuration revision.
    pub revision: u64,
}

impl ProjectState {
    pub fn new(project_id: ProjectId) -> Self {
        ProjectState {
            project_id,
            settings: None,
            settings_history: History::default(),
            segmenters: BTreeMap::new(),
            segments: BTreeMap::new(),
            segment_history: HashMap::new(),
            treatments: BTreeMap::new(),
            treatment_history: HashMap::new(),
            experiments: BTreeMap::new(),
            experiment_history: HashMap::new(),
            revision: 0,
        }
    }

    /// Global segmenters followed by the project's custom ones.
    pub fn catalog(&self) -> Vec<SegmenterDescriptor> {
        let mut catalog = global_segmenters();
        catalog.extend(self.segmenters.values().cloned());
        catalog
    }

    pub fn experiment_list(&self) -> Vec<Experiment> {
        self.experiments.values().cloned().collect()
    }

    /// The configuration the treatment path needs, if the project is set up.
    pub fn config(&self) -> Option<ProjectConfig> {
        let settings = self.settings.clone()?;
        Some(ProjectConfig {
            settings,
            segmenters: self.catalog(),
            experiments: self.experiment_list(),
        })
    }
}

/// In-memory state, partitioned per project. Holding a project's guard is
/// what serializes validate-then-commit for that project.
#[derive(Default)]
pub struct Store {
    projects: DashMap<ProjectId, Arc<Mutex<ProjectState>>>,
    next_id: AtomicI64,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclusive access to a project that already exists.
    pub async fn lock(&self, project_id: ProjectId) -> Option<OwnedMutexGuard<ProjectState>> {
        let project = self.projects.get(&project_id)?.value().clone();
        Some(project.lock_owned().await)
    }

    /// Exclusive access to a project, creating empty state on first use.
    /// Only the calls that bring a project into existence go through here.
    pub async fn lock_or_create(&self, project_id: ProjectId) -> OwnedMutexGuard<ProjectState> {
        let project = self
            .projects
            .entry(project_id)
            .or_insert_with(|| Arc::new(Mutex::new(ProjectState::new(project_id))))
            .value()
            .clone();
        project.lock_owned().await
    }

    pub fn project_ids(&self) -> Vec<ProjectId> {
        let mut ids: Vec<ProjectId> = self.projects.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Ids are unique across entities and projects.
    pub fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}
