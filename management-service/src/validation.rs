use std::collections::HashSet;

use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

use experiments_common::experiment::{Experiment, ExperimentType};
use experiments_common::geo::CellId;
use experiments_common::project::ProjectSegmenters;
use experiments_common::segment::SegmentSpec;
use experiments_common::segmenter::{is_global_segmenter, SegmenterDescriptor, S2_IDS};
use experiments_common::validation::ValidationError;
use experiments_common::value::SegmenterValue;

/// Names start and end with an alphanumeric (or a handful of symbols at the
/// end) and are 4 to 64 characters long.
static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z\d][\w\d \-()#$%&:.]{2,62}[\w\d\-()#$%&:.]$")
        .expect("name pattern is a valid regex")
});

/// Segmenter names are used as request field names.
static SEGMENTER_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,63}$").expect("segmenter pattern is a valid regex"));

/// Range of S2 levels segments may be expressed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct S2Levels {
    pub min: u8,
    pub max: u8,
}

pub fn check_name(errors: &mut ValidationError, field: &str, name: &str) {
    if !NAME_PATTERN.is_match(name) {
        errors.push(format!(
            "{field} '{name}' must be 4 to 64 characters, start with a letter or digit and use only letters, digits, spaces and -()#$%&:."
        ));
    }
}

/// Checks the segmenter selection and other settings of a project against
/// the segmenters it can choose from.
pub fn validate_settings(
    randomization_key: &str,
    segmenters: &ProjectSegmenters,
    default_timezone: Option<&str>,
    catalog: &[SegmenterDescriptor],
) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();

    if randomization_key.trim().is_empty() {
        errors.push("randomization_key must not be empty");
    }

    if let Some(tz) = default_timezone {
        if tz.parse::<Tz>().is_err() {
            errors.push(format!("default_timezone '{tz}' is not a known timezone"));
        }
    }

    let mut seen = HashSet::new();
    for name in &segmenters.names {
        if !seen.insert(name.as_str()) {
            errors.push(format!("segmenter '{name}' is listed more than once"));
        }
        match catalog.iter().find(|s| &s.name == name) {
            None => errors.push(format!("segmenter '{name}' does not exist")),
            Some(descriptor) => {
                if let Some(variables) = segmenters.variables.get(name) {
                    if !descriptor.accepts_variables(variables) {
                        errors.push(format!(
                            "variables [{}] are not a valid option for segmenter '{name}'",
                            variables.join(", ")
                        ));
                    }
                }
            }
        }
    }

    for name in segmenters.variables.keys() {
        if !segmenters.names.contains(name) {
            errors.push(format!("variables given for segmenter '{name}' which is not selected"));
        }
    }

    for descriptor in catalog.iter().filter(|s| s.required) {
        if !segmenters.names.contains(&descriptor.name) {
            errors.push(format!("segmenter '{}' is required", descriptor.name));
        }
    }

    errors.into_result()
}

pub fn validate_custom_segmenter(descriptor: &SegmenterDescriptor) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();

    if !SEGMENTER_NAME_PATTERN.is_match(&descriptor.name) {
        errors.push(format!(
            "segmenter name '{}' must be lowercase letters, digits and underscores",
            descriptor.name
        ));
    }
    if is_global_segmenter(&descriptor.name) {
        errors.push(format!("segmenter name '{}' is reserved", descriptor.name));
    }
    if descriptor.options.is_empty() || descriptor.options.iter().any(|o| o.is_empty()) {
        errors.push("options must contain at least one non-empty list of fields");
    }
    if let Some(constraints) = &descriptor.constraints {
        for value in constraints {
            if value.retype(descriptor.segmenter_type).is_err() {
                errors.push(format!(
                    "constraint {value} is not of type {}",
                    descriptor.segmenter_type
                ));
            }
        }
    }

    errors.into_result()
}

/// Validates a segment against the project's enabled segmenters and returns
/// it with every value converted to its segmenter's declared type.
pub fn validate_segment(
    segment: &SegmentSpec,
    enabled: &[String],
    catalog: &[SegmenterDescriptor],
    levels: S2Levels,
) -> Result<SegmentSpec, ValidationError> {
    let mut errors = ValidationError::new();
    let mut normalized = SegmentSpec::new();

    for (name, values) in &segment.0 {
        if !enabled.contains(name) {
            errors.push(format!("segmenter '{name}' is not enabled for the project"));
            continue;
        }
        let Some(descriptor) = catalog.iter().find(|s| &s.name == name) else {
            errors.push(format!("segmenter '{name}' does not exist"));
            continue;
        };
        if !descriptor.multi_valued && values.len() > 1 {
            errors.push(format!("segmenter '{name}' accepts a single value"));
        }

        let mut typed = Vec::with_capacity(values.len());
        for value in values {
            match value.retype(descriptor.segmenter_type) {
                Ok(v) => typed.push(v),
                Err(e) => errors.push(format!("segmenter '{name}': value {value}: {e}")),
            }
        }

        if let Some(allowed) = &descriptor.constraints {
            for value in typed.iter().filter(|v| !allowed.contains(v)) {
                errors.push(format!("segmenter '{name}': value {value} is not allowed"));
            }
        }

        if name == S2_IDS {
            for value in &typed {
                check_s2_cell(&mut errors, value, levels);
            }
        }

        normalized.0.insert(name.clone(), typed);
    }

    errors.into_result().map(|_| normalized)
}

fn check_s2_cell(errors: &mut ValidationError, value: &SegmenterValue, levels: S2Levels) {
    let Some(raw) = value.as_i64() else {
        return;
    };
    let cell = CellId(raw as u64);
    if !cell.is_valid() {
        errors.push(format!("s2_ids: {raw} is not a valid cell id"));
        return;
    }
    let level = cell.level();
    if level < levels.min || level > levels.max {
        errors.push(format!(
            "s2_ids: cell {raw} is at level {level}, allowed levels are {} to {}",
            levels.min, levels.max
        ));
    }
}

/// Field level checks on an experiment, independent of other experiments.
pub fn validate_experiment(experiment: &Experiment) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();

    check_name(&mut errors, "name", &experiment.name);

    if experiment.end_time <= experiment.start_time {
        errors.push("end_time must be after start_time");
    }

    match (experiment.experiment_type, experiment.interval) {
        (ExperimentType::AB, Some(_)) => errors.push("interval is only allowed for Switchback experiments"),
        (ExperimentType::Switchback, None | Some(0)) => {
            errors.push("interval must be a positive number of minutes for Switchback experiments")
        }
        _ => {}
    }

    if experiment.treatments.is_empty() {
        errors.push("at least one treatment is required");
    }

    let mut names = HashSet::new();
    for treatment in &experiment.treatments {
        check_name(&mut errors, "treatment name", &treatment.name);
        if !names.insert(treatment.name.as_str()) {
            errors.push(format!("treatment name '{}' is used more than once", treatment.name));
        }
    }

    for treatment in &experiment.treatments {
        if treatment.traffic.is_some_and(|traffic| traffic > 100) {
            errors.push(format!(
                "treatment '{}' traffic must be between 0 and 100",
                treatment.name
            ));
        }
    }
    let total: u64 = experiment
        .treatments
        .iter()
        .filter_map(|t| t.traffic)
        .map(u64::from)
        .sum();
    if total != 0 && experiment.treatments.iter().any(|t| t.traffic.unwrap_or(0) == 0) {
        errors.push("every treatment must have non-zero traffic when traffic is allocated");
    }
    match experiment.experiment_type {
        ExperimentType::AB if total != 100 => {
            errors.push("treatment traffic must sum to 100 for A/B experiments")
        }
        ExperimentType::Switchback if total != 0 && total != 100 => {
            errors.push("treatment traffic must sum to 0 or 100 for Switchback experiments")
        }
        _ => {}
    }

    errors.into_result()
}
