use chrono::{DateTime, Utc};
use thiserror::Error;

use experiments_common::experiment::{Experiment, ExperimentId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("experiments {first} and {second} would no longer be orthogonal")]
pub struct OrthogonalityError {
    pub first: ExperimentId,
    pub second: ExperimentId,
}

/// Experiments that can still serve traffic at or after `now`.
fn live<'a>(experiments: &'a [Experiment], now: DateTime<Utc>) -> impl Iterator<Item = &'a Experiment> {
    experiments
        .iter()
        .filter(move |e| e.is_active() && e.end_time > now)
}

/// Two experiments compete for the same requests when they share a tier,
/// their schedules intersect, and their segments overlap over `segmenters`.
fn competes(a: &Experiment, b: &Experiment, segmenters: &[String]) -> bool {
    a.tier == b.tier && a.schedule_overlaps(b) && a.segment.overlaps(&b.segment, segmenters)
}

/// Checks that switching the project's segmenters from `existing` to
/// `proposed` keeps every pair of live experiments apart that was apart
/// before.
pub fn validate_segmenter_change(
    existing: &[String],
    proposed: &[String],
    experiments: &[Experiment],
    now: DateTime<Utc>,
) -> Result<(), OrthogonalityError> {
    let live: Vec<&Experiment> = live(experiments, now).collect();
    for (i, a) in live.iter().enumerate() {
        for b in &live[i + 1..] {
            if !competes(a, b, existing) && competes(a, b, proposed) {
                return Err(OrthogonalityError {
                    first: a.id.min(b.id),
                    second: a.id.max(b.id),
                });
            }
        }
    }
    Ok(())
}

/// Checks that a new or changed experiment does not compete with any other
/// live experiment of the project.
pub fn validate_experiment(
    candidate: &Experiment,
    others: &[Experiment],
    segmenters: &[String],
    now: DateTime<Utc>,
) -> Result<(), OrthogonalityError> {
    if !candidate.is_active() || candidate.end_time <= now {
        return Ok(());
    }
    match live(others, now).find(|other| other.id != candidate.id && competes(candidate, other, segmenters)) {
        Some(other) => Err(OrthogonalityError {
            first: candidate.id.min(other.id),
            second: candidate.id.max(other.id),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use experiments_common::experiment::{ExperimentStatus, ExperimentTier, ExperimentType};
    use experiments_common::segment::SegmentSpec;
    use experiments_common::value::SegmenterValue;

    fn experiment(id: ExperimentId, segment: SegmentSpec) -> Experiment {
        let now = Utc::now();
        Experiment {
            id,
            project_id: 1,
            name: format!("exp-{id}"),
            description: None,
            experiment_type: ExperimentType::AB,
            interval: None,
            tier: ExperimentTier::Default,
            treatments: vec![],
            segment,
            status: ExperimentStatus::Active,
            start_time: now - Duration::hours(1),
            end_time: now + Duration::hours(1),
            version: 1,
            updated_by: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn pair() -> Vec<Experiment> {
        vec![
            experiment(
                1,
                SegmentSpec::new()
                    .with("country", vec!["SG".into()])
                    .with("days_of_week", vec![SegmenterValue::Integer(1)]),
            ),
            experiment(
                2,
                SegmentSpec::new()
                    .with("country", vec!["SG".into()])
                    .with("days_of_week", vec![SegmenterValue::Integer(2)]),
            ),
        ]
    }

    #[test]
    fn test_removing_the_separating_segmenter_is_rejected() {
        let result = validate_segmenter_change(
            &names(&["country", "days_of_week"]),
            &names(&["country"]),
            &pair(),
            Utc::now(),
        );
        assert_eq!(result, Err(OrthogonalityError { first: 1, second: 2 }));
    }

    #[test]
    fn test_harmless_changes_pass() {
        let now = Utc::now();
        let existing = names(&["country", "days_of_week"]);
        assert!(validate_segmenter_change(
            &existing,
            &names(&["country", "days_of_week", "hours_of_day"]),
            &pair(),
            now
        )
        .is_ok());
        assert!(validate_segmenter_change(&existing, &names(&["days_of_week"]), &pair(), now).is_ok());
    }

    #[test]
    fn test_pairs_that_never_coexist_are_ignored() {
        let now = Utc::now();
        let mut experiments = pair();
        experiments[1].tier = ExperimentTier::Override;
        let existing = names(&["country", "days_of_week"]);
        assert!(validate_segmenter_change(&existing, &names(&["country"]), &experiments, now).is_ok());

        let mut experiments = pair();
        experiments[1].status = ExperimentStatus::Inactive;
        assert!(validate_segmenter_change(&existing, &names(&["country"]), &experiments, now).is_ok());

        let mut experiments = pair();
        experiments[1].end_time = now - Duration::minutes(1);
        assert!(validate_segmenter_change(&existing, &names(&["country"]), &experiments, now).is_ok());
    }

    #[test]
    fn test_new_experiment_must_not_overlap() {
        let now = Utc::now();
        let segmenters = names(&["country", "days_of_week"]);
        let existing = pair();

        let clash = experiment(
            3,
            SegmentSpec::new()
                .with("country", vec!["SG".into(), "ID".into()])
                .with("days_of_week", vec![SegmenterValue::Integer(2)]),
        );
        assert_eq!(
            validate_experiment(&clash, &existing, &segmenters, now),
            Err(OrthogonalityError { first: 2, second: 3 })
        );

        let apart = experiment(
            3,
            SegmentSpec::new()
                .with("country", vec!["ID".into()])
                .with("days_of_week", vec![SegmenterValue::Integer(2)]),
        );
        assert!(validate_experiment(&apart, &existing, &segmenters, now).is_ok());

        let mut override_tier = clash.clone();
        override_tier.tier = ExperimentTier::Override;
        assert!(validate_experiment(&override_tier, &existing, &segmenters, now).is_ok());
    }

    #[test]
    fn test_updating_an_experiment_ignores_its_old_self() {
        let existing = pair();
        let mut updated = existing[0].clone();
        updated.description = Some("changed".to_string());
        assert!(validate_experiment(
            &updated,
            &existing,
            &names(&["country", "days_of_week"]),
            Utc::now()
        )
        .is_ok());
    }
}
