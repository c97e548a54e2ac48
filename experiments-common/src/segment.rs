use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::SegmenterValue;

/// Segmenter name to allowed values. A missing key or an empty list is a
/// wildcard for that segmenter.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SegmentSpec(pub BTreeMap<String, Vec<SegmenterValue>>);

impl SegmentSpec {
    pub fn new() -> Self {
        SegmentSpec(BTreeMap::new())
    }

    pub fn with(mut self, segmenter: &str, values: Vec<SegmenterValue>) -> Self {
        self.0.insert(segmenter.to_string(), values);
        self
    }

    /// Allowed values for a segmenter, `None` when it is a wildcard.
    pub fn constraint(&self, segmenter: &str) -> Option<&[SegmenterValue]> {
        match self.0.get(segmenter) {
            Some(values) if !values.is_empty() => Some(values.as_slice()),
            _ => None,
        }
    }

    pub fn is_wildcard(&self, segmenter: &str) -> bool {
        self.constraint(segmenter).is_none()
    }

    /// Names of the segmenters this spec actually constrains.
    pub fn constrained_segmenters(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(name, _)| name.as_str())
    }

    /// Two segments overlap over `segmenters` when, for every segmenter, both
    /// are wildcards or both are constrained with at least one common value.
    ///
    /// A wildcard paired with a constrained list does not overlap: requests
    /// carrying a value prefer the exact match, requests without one can only
    /// match the wildcard.
    pub fn overlaps(&self, other: &SegmentSpec, segmenters: &[String]) -> bool {
        segmenters.iter().all(|name| {
            match (self.constraint(name), other.constraint(name)) {
                (None, None) => true,
                (Some(ours), Some(theirs)) => ours.iter().any(|v| theirs.contains(v)),
                _ => false,
            }
        })
    }
}
