use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, warn};

use experiments_common::experiment::{Experiment, ExperimentId};
use experiments_common::segmenter::SegmenterDescriptor;

use crate::matching::{match_experiment, RequestFilters, SegmenterMatch};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("experiment {0} is configured more than once")]
    AssignmentAmbiguity(ExperimentId),
}

/// A running experiment whose segment matched the request.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub experiment: &'a Experiment,
    pub matches: Vec<SegmenterMatch>,
}

/// Exact beats weak on the first segmenter, in project order, where the two
/// differ.
fn exactness(a: &[SegmenterMatch], b: &[SegmenterMatch]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        match (x, y) {
            (SegmenterMatch::Exact { .. }, SegmenterMatch::Weak) => return Ordering::Less,
            (SegmenterMatch::Weak, SegmenterMatch::Exact { .. }) => return Ordering::Greater,
            _ => {}
        }
    }
    Ordering::Equal
}

/// Lower matched position beats higher on the first segmenter where both
/// matched exactly at different positions.
fn granularity(a: &[SegmenterMatch], b: &[SegmenterMatch]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        if let (SegmenterMatch::Exact { position: p }, SegmenterMatch::Exact { position: q }) =
            (x, y)
        {
            match p.cmp(q) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
    }
    Ordering::Equal
}

/// Tier and specificity only. `Less` means `a` is preferred.
fn precedence(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    b.experiment
        .tier
        .priority()
        .cmp(&a.experiment.tier.priority())
        .then_with(|| exactness(&a.matches, &b.matches))
        .then_with(|| granularity(&a.matches, &b.matches))
}

/// The full selection order: tier, specificity, then lowest id.
pub fn compare(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    precedence(a, b).then_with(|| a.experiment.id.cmp(&b.experiment.id))
}

/// Picks the experiment serving a request, or `None` when nothing running
/// matches.
pub fn select<'a>(
    experiments: &'a [Experiment],
    descriptors: &[SegmenterDescriptor],
    filters: &RequestFilters,
    now: DateTime<Utc>,
) -> Result<Option<&'a Experiment>, SelectionError> {
    let mut candidates: Vec<Candidate<'a>> = experiments
        .iter()
        .filter(|experiment| experiment.is_running_at(now))
        .filter_map(|experiment| {
            match_experiment(experiment, descriptors, filters).map(|matches| Candidate {
                experiment,
                matches,
            })
        })
        .collect();

    candidates.sort_by(compare);

    if let [first, second, ..] = candidates.as_slice() {
        if first.experiment.id == second.experiment.id {
            error!(
                experiment_id = first.experiment.id,
                "experiment appears twice among candidates"
            );
            return Err(SelectionError::AssignmentAmbiguity(first.experiment.id));
        }
        if precedence(first, second) == Ordering::Equal {
            warn!(
                selected = first.experiment.id,
                tied_with = second.experiment.id,
                "experiments tie on tier and specificity, picking the lowest id"
            );
        }
    }

    Ok(candidates.first().map(|candidate| candidate.experiment))
}
