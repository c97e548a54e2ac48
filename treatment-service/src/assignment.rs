use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};
use thiserror::Error;

use experiments_common::experiment::{Experiment, ExperimentId, ExperimentTreatment, ExperimentType};

const LONG_SCALE: u64 = 0xfffffffffffffff;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssignmentError {
    #[error("experiment {0} has no treatment to assign")]
    NoTreatment(ExperimentId),
    #[error("switchback experiment {0} has no interval")]
    MissingInterval(ExperimentId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment<'a> {
    pub treatment: &'a ExperimentTreatment,
    /// Set for switchback experiments only.
    pub switchback_window_id: Option<i64>,
}

/// Maps a key to a float in `[0, 1)` using the first 60 bits of its SHA-1.
pub fn calculate_hash(key: &str) -> f64 {
    let digest = Sha1::digest(key.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    let hash_val = u64::from_be_bytes(head) >> 4;
    hash_val as f64 / LONG_SCALE as f64
}

/// Walks the treatments accumulating traffic and returns the first whose
/// cumulative bound exceeds the seed's point in `[0, total)`.
fn weighted_choice<'a>(
    treatments: &'a [ExperimentTreatment],
    seed: &str,
) -> Option<&'a ExperimentTreatment> {
    let total: u64 = treatments
        .iter()
        .filter_map(|t| t.traffic)
        .map(u64::from)
        .sum();
    if total == 0 {
        return None;
    }
    let point = calculate_hash(seed) * total as f64;

    let mut cumulative = 0u64;
    for treatment in treatments {
        cumulative += u64::from(treatment.traffic.unwrap_or(0));
        if point < cumulative as f64 {
            return Some(treatment);
        }
    }
    // Only reachable through float rounding at the very top of the range.
    treatments.iter().rev().find(|t| t.traffic.unwrap_or(0) > 0)
}

/// Index of the switchback window containing `now`. Windows are half-open
/// and instants before the start fall in window 0.
pub fn switchback_window(start_time: DateTime<Utc>, now: DateTime<Utc>, interval_minutes: u32) -> i64 {
    let elapsed = (now - start_time).num_seconds().max(0);
    elapsed / (i64::from(interval_minutes) * 60)
}

pub fn assign<'a>(
    experiment: &'a Experiment,
    now: DateTime<Utc>,
    randomization_value: &str,
) -> Result<Assignment<'a>, AssignmentError> {
    let treatments = experiment.treatments.as_slice();
    if treatments.is_empty() {
        return Err(AssignmentError::NoTreatment(experiment.id));
    }

    match experiment.experiment_type {
        ExperimentType::AB => {
            let seed = format!("{}-{}", randomization_value, experiment.id);
            let treatment = weighted_choice(treatments, &seed)
                .ok_or(AssignmentError::NoTreatment(experiment.id))?;
            Ok(Assignment {
                treatment,
                switchback_window_id: None,
            })
        }
        ExperimentType::Switchback => {
            let interval = experiment
                .interval
                .filter(|minutes| *minutes > 0)
                .ok_or(AssignmentError::MissingInterval(experiment.id))?;
            let window = switchback_window(experiment.start_time, now, interval);

            let total: u32 = treatments.iter().filter_map(|t| t.traffic).sum();
            let treatment = if total == 100 {
                let seed = format!("{}-{}", window, experiment.id);
                weighted_choice(treatments, &seed)
                    .ok_or(AssignmentError::NoTreatment(experiment.id))?
            } else {
                let len = i64::try_from(treatments.len()).unwrap_or(i64::MAX);
                let index = usize::try_from(window % len).unwrap_or(0);
                &treatments[index]
            };
            Ok(Assignment {
                treatment,
                switchback_window_id: Some(window),
            })
        }
    }
}
