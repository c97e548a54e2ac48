use experiments_common::value::SegmenterValue;

use super::{integer_field, number_field, RequestContext, SegmenterError, SegmenterRunner};
use experiments_common::geo::{CellId, MAX_LEVEL};

/// Resolves a location to the S2 cells containing it, most granular level
/// first, so that the matcher prefers the finest matching cell.
pub struct S2IdsRunner {
    min_level: u8,
    max_level: u8,
}

impl S2IdsRunner {
    pub fn new(min_level: u8, max_level: u8) -> Result<Self, SegmenterError> {
        if min_level > max_level || max_level > MAX_LEVEL {
            return Err(SegmenterError::InvalidLevels {
                min: min_level,
                max: max_level,
            });
        }
        Ok(S2IdsRunner {
            min_level,
            max_level,
        })
    }

    fn cell(
        &self,
        segmenter: &str,
        ctx: &RequestContext<'_>,
        variables: &[String],
    ) -> Result<CellId, SegmenterError> {
        let has = |name: &str| variables.iter().any(|v| v == name);

        if variables.len() == 2 && has("latitude") && has("longitude") {
            let lat = number_field(ctx, "latitude", segmenter)?;
            let lng = number_field(ctx, "longitude", segmenter)?;
            return Ok(CellId::at_level(lat, lng, self.max_level)?);
        }

        if variables.len() == 1 && has("s2id") {
            let cell = CellId(integer_field(ctx, "s2id", segmenter)? as u64);
            if !cell.is_valid() {
                return Err(SegmenterError::InvalidValue {
                    field: "s2id".to_string(),
                    segmenter: segmenter.to_string(),
                });
            }
            return Ok(cell);
        }

        Err(SegmenterError::NoValidVariables(segmenter.to_string()))
    }
}

impl SegmenterRunner for S2IdsRunner {
    fn transform(
        &self,
        segmenter: &str,
        ctx: &RequestContext<'_>,
        variables: Option<&[String]>,
    ) -> Result<Vec<SegmenterValue>, SegmenterError> {
        let Some(variables) = variables else {
            return Ok(vec![]);
        };
        let cell = self.cell(segmenter, ctx, variables)?;

        // Levels finer than the given cell have no meaningful ancestor id.
        let top = self.max_level.min(cell.level());
        Ok((self.min_level..=top)
            .rev()
            .map(|level| SegmenterValue::Integer(cell.parent(level).0 as i64))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmenters::test_support::{context, vars};
    use serde_json::json;

    fn runner() -> S2IdsRunner {
        S2IdsRunner::new(10, 14).unwrap()
    }

    fn integers(values: Vec<SegmenterValue>) -> Vec<i64> {
        values.into_iter().filter_map(|v| v.as_i64()).collect()
    }

    #[test]
    fn test_lat_lng_resolves_every_level_most_granular_first() {
        let attributes = json!({"latitude": 1.2537040223936706, "longitude": 103.899899113748});
        let ctx = context(attributes.as_object().unwrap());
        let values = runner()
            .transform("s2_ids", &ctx, Some(&vars(&["longitude", "latitude"])))
            .unwrap();
        assert_eq!(
            integers(values),
            vec![
                3592210809859604480,
                3592210814154571776,
                3592210796974702592,
                3592210865694179328,
                3592211140572086272,
            ]
        );
    }

    #[test]
    fn test_lat_lng_as_strings() {
        let attributes = json!({"latitude": "1.2537040223936706", "longitude": "103.899899113748"});
        let ctx = context(attributes.as_object().unwrap());
        let values = runner()
            .transform("s2_ids", &ctx, Some(&vars(&["latitude", "longitude"])))
            .unwrap();
        assert_eq!(integers(values)[0], 3592210809859604480);
    }

    #[test]
    fn test_s2id_resolves_parents() {
        let attributes = json!({"s2id": 3348536261227839488i64});
        let ctx = context(attributes.as_object().unwrap());
        let values = runner()
            .transform("s2_ids", &ctx, Some(&vars(&["s2id"])))
            .unwrap();
        assert_eq!(
            integers(values),
            vec![
                3348536261227839488,
                3348536256932872192,
                3348536205393264640,
                3348535999234834432,
                3348535174601113600,
            ]
        );
    }

    #[test]
    fn test_invalid_inputs() {
        let attributes = json!({"s2id": 3348536, "latitude": 106, "longitude": 103.8});
        let ctx = context(attributes.as_object().unwrap());

        let err = runner()
            .transform("s2_ids", &ctx, Some(&vars(&["s2id"])))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "provided s2id variable for s2_ids segmenter is invalid"
        );

        let err = runner()
            .transform("s2_ids", &ctx, Some(&vars(&["latitude", "longitude"])))
            .unwrap_err();
        assert_eq!(err.to_string(), "received invalid latitude, longitude values");

        let err = runner()
            .transform("s2_ids", &ctx, Some(&vars(&["invalid_var"])))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "no valid variables were provided for s2_ids segmenter"
        );
    }

    #[test]
    fn test_level_bounds_are_checked() {
        assert!(S2IdsRunner::new(15, 14).is_err());
        assert!(S2IdsRunner::new(0, 31).is_err());
    }
}
