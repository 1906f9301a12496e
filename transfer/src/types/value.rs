use std::mem::size_of;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::types::SizeHint;
use crate::types::markers::TOAST_UNAVAILABLE_VALUE;
use crate::types::sized::checked_add_or_saturating;

/// A single decoded column value of a change event.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(BigDecimal),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    TimestampNtz(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    /// Semi-structured payload, written to struct columns.
    Json(serde_json::Value),
    Array(Vec<Value>),
}

impl Value {
    /// Returns `true` if this is the placeholder sent for an omitted TOAST column.
    pub fn is_toast_unavailable(&self) -> bool {
        matches!(self, Value::String(value) if value == TOAST_UNAVAILABLE_VALUE)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts this value into its JSON representation.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(value) => serde_json::Value::Bool(*value),
            Value::Int(value) => serde_json::Value::from(*value),
            Value::Float(value) => serde_json::Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Decimal(value) => serde_json::Value::String(value.to_string()),
            Value::String(value) => serde_json::Value::String(value.clone()),
            Value::Bytes(value) => serde_json::Value::from(value.clone()),
            Value::Date(value) => serde_json::Value::String(value.to_string()),
            Value::Time(value) => serde_json::Value::String(value.to_string()),
            Value::TimestampNtz(value) => serde_json::Value::String(value.to_string()),
            Value::TimestampTz(value) => serde_json::Value::String(value.to_rfc3339()),
            Value::Json(value) => value.clone(),
            Value::Array(values) => {
                serde_json::Value::Array(values.iter().map(Value::to_json).collect())
            }
        }
    }
}

impl SizeHint for Value {
    fn size_hint(&self) -> usize {
        match self {
            Value::Null => 0,
            Value::Bool(_) => size_of::<bool>(),
            Value::Int(_) => size_of::<i64>(),
            Value::Float(_) => size_of::<f64>(),
            Value::Decimal(value) => checked_add_or_saturating(
                size_of::<BigDecimal>(),
                usize::try_from(value.digits()).unwrap_or(usize::MAX),
                "value.decimal_digits",
            ),
            Value::String(value) => value.len(),
            Value::Bytes(value) => value.len(),
            Value::Date(_) => size_of::<NaiveDate>(),
            Value::Time(_) => size_of::<NaiveTime>(),
            Value::TimestampNtz(_) => size_of::<NaiveDateTime>(),
            Value::TimestampTz(_) => size_of::<DateTime<Utc>>(),
            Value::Json(value) => estimate_json_bytes(value),
            Value::Array(values) => values.as_slice().size_hint(),
        }
    }
}

fn estimate_json_bytes(value: &serde_json::Value) -> usize {
    match value {
        serde_json::Value::Null => 0,
        serde_json::Value::Bool(_) => size_of::<bool>(),
        serde_json::Value::Number(_) => size_of::<f64>(),
        serde_json::Value::String(value) => value.len(),
        serde_json::Value::Array(values) => values.iter().fold(0, |total, value| {
            checked_add_or_saturating(total, estimate_json_bytes(value), "json.array_element")
        }),
        serde_json::Value::Object(values) => values.iter().fold(0, |total, (key, value)| {
            let with_key = checked_add_or_saturating(total, key.len(), "json.object_key");
            checked_add_or_saturating(with_key, estimate_json_bytes(value), "json.object_value")
        }),
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}
