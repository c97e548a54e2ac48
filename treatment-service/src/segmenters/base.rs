use experiments_common::value::{SegmenterType, SegmenterValue};
use serde_json::Value;

use super::{RequestContext, SegmenterError, SegmenterRunner};

/// Reads a single value of a declared type. Used for custom segmenters.
pub struct TypedRunner {
    segmenter_type: SegmenterType,
}

impl TypedRunner {
    pub fn new(segmenter_type: SegmenterType) -> Self {
        TypedRunner { segmenter_type }
    }
}

impl SegmenterRunner for TypedRunner {
    fn transform(
        &self,
        segmenter: &str,
        ctx: &RequestContext<'_>,
        variables: Option<&[String]>,
    ) -> Result<Vec<SegmenterValue>, SegmenterError> {
        let Some(field) = variables.and_then(|v| v.first()) else {
            return Ok(vec![]);
        };

        match ctx.attributes.get(field) {
            None | Some(Value::Null) => Ok(vec![]),
            Some(raw) => SegmenterValue::coerce(raw, self.segmenter_type)
                .map(|value| vec![value])
                .map_err(|e| SegmenterError::InvalidType {
                    field: field.clone(),
                    segmenter: segmenter.to_string(),
                    expected: e.expected,
                }),
        }
    }
}
