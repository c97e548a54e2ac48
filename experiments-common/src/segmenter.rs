use serde::{Deserialize, Serialize};

use crate::value::{SegmenterType, SegmenterValue};

pub const S2_IDS: &str = "s2_ids";
pub const DAYS_OF_WEEK: &str = "days_of_week";
pub const HOURS_OF_DAY: &str = "hours_of_day";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmenterScope {
    Global,
    Project,
}

/// Describes one segmenter: how its raw input is found in a request and how
/// its values are typed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SegmenterDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub segmenter_type: SegmenterType,
    /// Alternative lists of request fields. The first list whose fields are
    /// all present in a request is used.
    pub options: Vec<Vec<String>>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub multi_valued: bool,
    /// Allowed values, when the segmenter has a closed domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Vec<SegmenterValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub scope: SegmenterScope,
}

impl SegmenterDescriptor {
    /// A custom project segmenter whose value is read from a field of the same name.
    pub fn custom(name: &str, segmenter_type: SegmenterType) -> Self {
        SegmenterDescriptor {
            name: name.to_string(),
            segmenter_type,
            options: vec![vec![name.to_string()]],
            required: false,
            multi_valued: false,
            constraints: None,
            description: None,
            scope: SegmenterScope::Project,
        }
    }

    /// Flat, de-duplicated list of every request field this segmenter may read.
    pub fn treatment_request_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = Vec::new();
        for option in &self.options {
            for field in option {
                if !fields.contains(field) {
                    fields.push(field.clone());
                }
            }
        }
        fields
    }

    /// Whether `variables` is one of the accepted field lists, ignoring order.
    pub fn accepts_variables(&self, variables: &[String]) -> bool {
        self.options.iter().any(|option| {
            option.len() == variables.len() && option.iter().all(|f| variables.contains(f))
        })
    }
}

/// The segmenters every project can enable without defining them.
pub fn global_segmenters() -> Vec<SegmenterDescriptor> {
    vec![
        SegmenterDescriptor {
            name: S2_IDS.to_string(),
            segmenter_type: SegmenterType::Integer,
            options: vec![
                vec!["latitude".to_string(), "longitude".to_string()],
                vec!["s2id".to_string()],
            ],
            required: false,
            multi_valued: true,
            constraints: None,
            description: Some("S2 cell ids, matched from the most granular level down".to_string()),
            scope: SegmenterScope::Global,
        },
        SegmenterDescriptor {
            name: DAYS_OF_WEEK.to_string(),
            segmenter_type: SegmenterType::Integer,
            options: vec![vec!["tz".to_string()], vec!["day_of_week".to_string()]],
            required: false,
            multi_valued: true,
            constraints: Some((1..=7).map(SegmenterValue::Integer).collect()),
            description: Some("Day of the week, Monday is 1".to_string()),
            scope: SegmenterScope::Global,
        },
        SegmenterDescriptor {
            name: HOURS_OF_DAY.to_string(),
            segmenter_type: SegmenterType::Integer,
            options: vec![vec!["tz".to_string()], vec!["hour_of_day".to_string()]],
            required: false,
            multi_valued: true,
            constraints: Some((0..=23).map(SegmenterValue::Integer).collect()),
            description: Some("Hour of the day, 0 to 23".to_string()),
            scope: SegmenterScope::Global,
        },
    ]
}

pub fn is_global_segmenter(name: &str) -> bool {
    matches!(name, S2_IDS | DAYS_OF_WEEK | HOURS_OF_DAY)
}
