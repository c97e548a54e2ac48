use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The declared type of a segmenter. Drives how raw request attributes and
/// configured segment values are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmenterType {
    String,
    Integer,
    Real,
    Bool,
}

impl fmt::Display for SegmenterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SegmenterType::String => "string",
            SegmenterType::Integer => "integer",
            SegmenterType::Real => "real",
            SegmenterType::Bool => "bool",
        };
        f.write_str(name)
    }
}

/// A single resolved or configured segmenter value.
///
/// Serialized untagged, so `3` is an integer, `3.5` a real, `"SG"` a string.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SegmenterValue {
    Bool(bool),
    Integer(i64),
    Real(f64),
    String(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected a value of type {expected}")]
pub struct ValueTypeError {
    pub expected: SegmenterType,
}

impl SegmenterValue {
    /// Converts a raw JSON value into a value of the given segmenter type.
    ///
    /// Numbers sent by browsers are always floats, so an integer segmenter
    /// accepts a float and truncates it. Numeric strings are accepted for
    /// integer and real segmenters.
    pub fn coerce(raw: &Value, ty: SegmenterType) -> Result<SegmenterValue, ValueTypeError> {
        let err = ValueTypeError { expected: ty };
        match ty {
            SegmenterType::String => match raw {
                Value::String(s) => Ok(SegmenterValue::String(s.clone())),
                _ => Err(err),
            },
            SegmenterType::Bool => match raw {
                Value::Bool(b) => Ok(SegmenterValue::Bool(*b)),
                _ => Err(err),
            },
            SegmenterType::Integer => match raw {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f as i64))
                    .map(SegmenterValue::Integer)
                    .ok_or(err),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(SegmenterValue::Integer)
                    .map_err(|_| err),
                _ => Err(err),
            },
            SegmenterType::Real => match raw {
                Value::Number(n) => n.as_f64().map(SegmenterValue::Real).ok_or(err),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(SegmenterValue::Real)
                    .map_err(|_| err),
                _ => Err(err),
            },
        }
    }

    /// Re-types an already parsed value, e.g. a segment value stored as an
    /// integer literal for a real segmenter.
    pub fn retype(&self, ty: SegmenterType) -> Result<SegmenterValue, ValueTypeError> {
        Self::coerce(&self.to_json(), ty)
    }

    pub fn value_type(&self) -> SegmenterType {
        match self {
            SegmenterValue::Bool(_) => SegmenterType::Bool,
            SegmenterValue::Integer(_) => SegmenterType::Integer,
            SegmenterValue::Real(_) => SegmenterType::Real,
            SegmenterValue::String(_) => SegmenterType::String,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SegmenterValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SegmenterValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            SegmenterValue::Bool(b) => Value::Bool(*b),
            SegmenterValue::Integer(i) => Value::from(*i),
            SegmenterValue::Real(r) => Value::from(*r),
            SegmenterValue::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for SegmenterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmenterValue::Bool(b) => write!(f, "{b}"),
            SegmenterValue::Integer(i) => write!(f, "{i}"),
            SegmenterValue::Real(r) => write!(f, "{r}"),
            SegmenterValue::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for SegmenterValue {
    fn from(value: i64) -> Self {
        SegmenterValue::Integer(value)
    }
}

impl From<&str> for SegmenterValue {
    fn from(value: &str) -> Self {
        SegmenterValue::String(value.to_string())
    }
}

impl From<bool> for SegmenterValue {
    fn from(value: bool) -> Self {
        SegmenterValue::Bool(value)
    }
}
