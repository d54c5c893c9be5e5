//! Attribute values and their canonical JSON encoding
//!
//! Attributes accept a closed set of value kinds. [`canonicalize`] is total over
//! that set: every value either maps to a JSON value or fails with
//! [`PublishError::InvalidAttribute`]. Nothing is stringified silently.

use crate::error::{PublishError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Attribute mapping of a dataset or variable
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A single attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
    List(Vec<AttributeValue>),
    /// Raw bytes have no JSON form and are rejected
    Bytes(Vec<u8>),
}

/// Canonicalize one attribute value to JSON.
///
/// Non-finite floats use the Zarr v2 spellings `"NaN"`, `"Infinity"` and
/// `"-Infinity"`; timestamps become RFC 3339 strings.
pub fn canonicalize(key: &str, value: &AttributeValue) -> Result<Value> {
    let json = match value {
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Int(i) => Value::Number((*i).into()),
        AttributeValue::UInt(u) => Value::Number((*u).into()),
        AttributeValue::Float(f) => match Number::from_f64(*f) {
            Some(n) => Value::Number(n),
            None if f.is_nan() => Value::String("NaN".to_string()),
            None if *f > 0.0 => Value::String("Infinity".to_string()),
            None => Value::String("-Infinity".to_string()),
        },
        AttributeValue::String(s) => Value::String(s.clone()),
        AttributeValue::DateTime(dt) => {
            Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        }
        AttributeValue::List(items) => Value::Array(
            items
                .iter()
                .map(|item| canonicalize(key, item))
                .collect::<Result<Vec<_>>>()?,
        ),
        AttributeValue::Bytes(_) => {
            return Err(PublishError::InvalidAttribute {
                key: key.to_string(),
                reason: "raw bytes are not JSON-representable".to_string(),
            })
        }
    };
    Ok(json)
}

/// Canonicalize a whole attribute mapping
pub fn canonicalize_attrs(attrs: &Attributes) -> Result<Map<String, Value>> {
    attrs
        .iter()
        .map(|(k, v)| Ok((k.clone(), canonicalize(k, v)?)))
        .collect()
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Int(value.into())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        AttributeValue::UInt(value.into())
    }
}

impl From<u64> for AttributeValue {
    fn from(value: u64) -> Self {
        AttributeValue::UInt(value)
    }
}

impl From<f32> for AttributeValue {
    fn from(value: f32) -> Self {
        AttributeValue::Float(value.into())
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(value: DateTime<Utc>) -> Self {
        AttributeValue::DateTime(value)
    }
}

impl<T: Into<AttributeValue>> From<Vec<T>> for AttributeValue {
    fn from(values: Vec<T>) -> Self {
        AttributeValue::List(values.into_iter().map(Into::into).collect())
    }
}
