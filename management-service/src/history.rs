use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One immutable snapshot of an entity as it was at `version`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HistoryEntry<T> {
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub snapshot: T,
}

/// Append-only, most recent first.
#[derive(Debug, Clone)]
pub struct History<T> {
    entries: VecDeque<HistoryEntry<T>>,
}

impl<T> Default for History<T> {
    fn default() -> Self {
        History {
            entries: VecDeque::new(),
        }
    }
}

impl<T: Clone> History<T> {
    pub fn record(&mut self, version: i64, snapshot: T) {
        self.entries.push_front(HistoryEntry {
            version,
            created_at: Utc::now(),
            snapshot,
        });
    }

    pub fn list(&self) -> Vec<HistoryEntry<T>> {
        self.entries.iter().cloned().collect()
    }

    pub fn get(&self, version: i64) -> Option<&HistoryEntry<T>> {
        self.entries.iter().find(|entry| entry.version == version)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
