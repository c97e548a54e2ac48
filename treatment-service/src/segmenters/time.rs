use chrono::{Datelike, Timelike};
use chrono_tz::Tz;
use serde_json::Value;

use experiments_common::value::{SegmenterType, SegmenterValue};

use super::{integer_field, RequestContext, SegmenterError, SegmenterRunner};

const HOURS: (i64, i64) = (0, 23);
const DAYS: (i64, i64) = (1, 7);

/// Hour of day, 0 to 23, in the request's timezone.
pub struct HoursOfDayRunner;

/// Day of week, Monday is 1, in the request's timezone.
pub struct DaysOfWeekRunner;

enum TimeInput {
    Zone(Tz),
    Explicit(i64),
}

fn time_input(
    segmenter: &str,
    ctx: &RequestContext<'_>,
    variables: Option<&[String]>,
    explicit_field: &str,
    bounds: (i64, i64),
) -> Result<TimeInput, SegmenterError> {
    let Some(variables) = variables else {
        return Ok(TimeInput::Zone(ctx.fallback_timezone));
    };

    match variables {
        [field] if field == "tz" => match ctx.attributes.get("tz") {
            Some(Value::String(name)) => name
                .parse::<Tz>()
                .map(TimeInput::Zone)
                .map_err(|_| SegmenterError::UnknownTimezone(name.clone())),
            _ => Err(SegmenterError::InvalidType {
                field: "tz".to_string(),
                segmenter: segmenter.to_string(),
                expected: SegmenterType::String,
            }),
        },
        [field] if field == explicit_field => {
            let value = integer_field(ctx, explicit_field, segmenter)?;
            if value < bounds.0 || value > bounds.1 {
                return Err(SegmenterError::InvalidValue {
                    field: explicit_field.to_string(),
                    segmenter: segmenter.to_string(),
                });
            }
            Ok(TimeInput::Explicit(value))
        }
        _ => Err(SegmenterError::NoValidVariables(segmenter.to_string())),
    }
}

impl SegmenterRunner for HoursOfDayRunner {
    fn transform(
        &self,
        segmenter: &str,
        ctx: &RequestContext<'_>,
        variables: Option<&[String]>,
    ) -> Result<Vec<SegmenterValue>, SegmenterError> {
        let hour = match time_input(segmenter, ctx, variables, "hour_of_day", HOURS)? {
            TimeInput::Zone(tz) => i64::from(ctx.now.with_timezone(&tz).hour()),
            TimeInput::Explicit(hour) => hour,
        };
        Ok(vec![SegmenterValue::Integer(hour)])
    }
}

impl SegmenterRunner for DaysOfWeekRunner {
    fn transform(
        &self,
        segmenter: &str,
        ctx: &RequestContext<'_>,
        variables: Option<&[String]>,
    ) -> Result<Vec<SegmenterValue>, SegmenterError> {
        let day = match time_input(segmenter, ctx, variables, "day_of_week", DAYS)? {
            TimeInput::Zone(tz) => {
                i64::from(ctx.now.with_timezone(&tz).weekday().number_from_monday())
            }
            TimeInput::Explicit(day) => day,
        };
        Ok(vec![SegmenterValue::Integer(day)])
    }
}
