use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::{Map, Value};
use thiserror::Error;

use experiments_common::segmenter::{SegmenterDescriptor, DAYS_OF_WEEK, HOURS_OF_DAY, S2_IDS};
use experiments_common::value::{SegmenterType, SegmenterValue};

use experiments_common::geo::GeoError;

pub mod base;
pub mod s2_ids;
pub mod time;

pub use base::TypedRunner;
pub use s2_ids::S2IdsRunner;
pub use time::{DaysOfWeekRunner, HoursOfDayRunner};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegmenterError {
    #[error("no valid variables were provided for {0} segmenter")]
    NoValidVariables(String),
    #[error("invalid type of variable ({field}) was provided for {segmenter} segmenter; expected {expected}")]
    InvalidType {
        field: String,
        segmenter: String,
        expected: SegmenterType,
    },
    #[error("provided {field} variable for {segmenter} segmenter is invalid")]
    InvalidValue { field: String, segmenter: String },
    #[error("invalid timezone {0}")]
    UnknownTimezone(String),
    #[error("s2 segmenter levels must satisfy 0 <= min ({min}) <= max ({max}) <= 30")]
    InvalidLevels { min: u8, max: u8 },
    #[error(transparent)]
    Geo(#[from] GeoError),
}

/// What a runner sees of one treatment request.
pub struct RequestContext<'a> {
    pub attributes: &'a Map<String, Value>,
    pub now: DateTime<Utc>,
    /// Timezone for time segmenters when the request names none.
    pub fallback_timezone: Tz,
}

/// Turns raw request fields into the values of one segmenter.
pub trait SegmenterRunner: Send + Sync {
    /// `variables` is the field list chosen for this request, `None` when
    /// no list was fully present.
    fn transform(
        &self,
        segmenter: &str,
        ctx: &RequestContext<'_>,
        variables: Option<&[String]>,
    ) -> Result<Vec<SegmenterValue>, SegmenterError>;
}

/// The built-in runners, plus typed runners for custom segmenters.
pub struct Segmenters {
    s2_ids: S2IdsRunner,
    days_of_week: DaysOfWeekRunner,
    hours_of_day: HoursOfDayRunner,
}

impl Segmenters {
    pub fn new(s2_min_level: u8, s2_max_level: u8) -> Result<Self, SegmenterError> {
        Ok(Segmenters {
            s2_ids: S2IdsRunner::new(s2_min_level, s2_max_level)?,
            days_of_week: DaysOfWeekRunner,
            hours_of_day: HoursOfDayRunner,
        })
    }

    pub fn transform(
        &self,
        descriptor: &SegmenterDescriptor,
        ctx: &RequestContext<'_>,
        variables: Option<&[String]>,
    ) -> Result<Vec<SegmenterValue>, SegmenterError> {
        let name = descriptor.name.as_str();
        match name {
            S2_IDS => self.s2_ids.transform(name, ctx, variables),
            DAYS_OF_WEEK => self.days_of_week.transform(name, ctx, variables),
            HOURS_OF_DAY => self.hours_of_day.transform(name, ctx, variables),
            _ => TypedRunner::new(descriptor.segmenter_type).transform(name, ctx, variables),
        }
    }
}

/// Reads a number from a JSON number or numeric string.
pub(crate) fn number_field(
    ctx: &RequestContext<'_>,
    field: &str,
    segmenter: &str,
) -> Result<f64, SegmenterError> {
    let invalid = || SegmenterError::InvalidType {
        field: field.to_string(),
        segmenter: segmenter.to_string(),
        expected: SegmenterType::Real,
    };
    match ctx.attributes.get(field) {
        Some(Value::Number(n)) => n.as_f64().ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

pub(crate) fn integer_field(
    ctx: &RequestContext<'_>,
    field: &str,
    segmenter: &str,
) -> Result<i64, SegmenterError> {
    let raw = ctx.attributes.get(field).unwrap_or(&Value::Null);
    SegmenterValue::coerce(raw, SegmenterType::Integer)
        .ok()
        .and_then(|v| v.as_i64())
        .ok_or_else(|| SegmenterError::InvalidType {
            field: field.to_string(),
            segmenter: segmenter.to_string(),
            expected: SegmenterType::Integer,
        })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn context(attributes: &Map<String, Value>) -> RequestContext<'_> {
        RequestContext {
            attributes,
            now: Utc::now(),
            fallback_timezone: Tz::UTC,
        }
    }

    pub fn vars(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }
}
