use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::debug;

use experiments_common::experiment::Experiment;
use experiments_common::project::ProjectSettings;
use experiments_common::segment::SegmentSpec;
use experiments_common::segmenter::SegmenterDescriptor;
use experiments_common::value::SegmenterValue;

use crate::segmenters::{RequestContext, Segmenters};

/// How an experiment's segment matched the request on one segmenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterMatch {
    /// The experiment does not constrain this segmenter.
    Weak,
    /// The request value at `position` is allowed. Lower is more granular.
    Exact { position: usize },
}

/// Values resolved from one request, keyed by segmenter name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestFilters(pub HashMap<String, Vec<SegmenterValue>>);

impl RequestFilters {
    pub fn values(&self, segmenter: &str) -> &[SegmenterValue] {
        self.0.get(segmenter).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn is_present(attributes: &Map<String, Value>, field: &str) -> bool {
    !matches!(attributes.get(field), None | Some(Value::Null))
}

/// Picks the request fields to read for a segmenter: the project's own
/// mapping first, then the descriptor's options in order.
pub fn choose_variables<'a>(
    settings: &'a ProjectSettings,
    descriptor: &'a SegmenterDescriptor,
    attributes: &Map<String, Value>,
) -> Option<&'a [String]> {
    settings
        .segmenters
        .variables
        .get(&descriptor.name)
        .into_iter()
        .chain(descriptor.options.iter())
        .find(|fields| !fields.is_empty() && fields.iter().all(|f| is_present(attributes, f)))
        .map(Vec::as_slice)
}

/// Resolves the values of every enabled segmenter for one request. A
/// segmenter that cannot be resolved contributes no values.
pub fn resolve_filters(
    settings: &ProjectSettings,
    descriptors: &[SegmenterDescriptor],
    segmenters: &Segmenters,
    ctx: &RequestContext<'_>,
) -> RequestFilters {
    let mut filters = HashMap::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let variables = choose_variables(settings, descriptor, ctx.attributes);
        let values = match segmenters.transform(descriptor, ctx, variables) {
            Ok(values) => values,
            Err(e) => {
                debug!(segmenter = %descriptor.name, error = %e, "could not resolve segmenter");
                vec![]
            }
        };
        filters.insert(descriptor.name.clone(), values);
    }
    RequestFilters(filters)
}

/// Matches one segment against the resolved request, per enabled segmenter
/// in order. `None` when any segmenter rules the segment out.
pub fn match_segment(
    segment: &SegmentSpec,
    descriptors: &[SegmenterDescriptor],
    filters: &RequestFilters,
) -> Option<Vec<SegmenterMatch>> {
    descriptors
        .iter()
        .map(|descriptor| {
            let Some(allowed) = segment.constraint(&descriptor.name) else {
                return Some(SegmenterMatch::Weak);
            };
            let allowed: Vec<SegmenterValue> = allowed
                .iter()
                .filter_map(|v| v.retype(descriptor.segmenter_type).ok())
                .collect();
            filters
                .values(&descriptor.name)
                .iter()
                .position(|value| allowed.contains(value))
                .map(|position| SegmenterMatch::Exact { position })
        })
        .collect()
}

pub fn match_experiment(
    experiment: &Experiment,
    descriptors: &[SegmenterDescriptor],
    filters: &RequestFilters,
) -> Option<Vec<SegmenterMatch>> {
    match_segment(&experiment.segment, descriptors, filters)
}

pub fn matches(
    experiment: &Experiment,
    descriptors: &[SegmenterDescriptor],
    filters: &RequestFilters,
) -> bool {
    match_experiment(experiment, descriptors, filters).is_some()
}
