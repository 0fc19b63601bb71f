//! Result values returned by query execution
//!
//! A result row is a sequence of tagged scalars, one variant per kind of
//! value the engine can hand back. Rows are hashable so result sets can be
//! compared as sets.
//!
//! # Equality
//!
//! - Integer, float and decimal values compare by numeric value
//!   (`Int(3) == Float(3.0) == Decimal(3.00)`)
//! - A boolean never equals a number; text never equals a number
//! - Nested values compare structurally and hash through their canonical text

mod numeric;

pub(crate) use numeric::{round_decimal, round_float};

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use numeric::NumericKey;

/// A single result row
pub type Row = Vec<Value>;

/// A scalar value as returned by the engine
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<FixedOffset>),
    /// Time of day without a date
    Time(NaiveTime),
    /// Composite values: JSON documents, arrays, records
    Nested(serde_json::Value),
}

impl Value {
    /// Returns a short kind name for logs and diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::Text(_) => "text",
            Value::Date(_) => "date",
            Value::Timestamp(_) => "timestamp",
            Value::TimestampTz(_) => "timestamptz",
            Value::Time(_) => "time",
            Value::Nested(_) => "nested",
        }
    }

    /// Returns true for integer, float and decimal values
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_) | Value::Decimal(_))
    }

    fn numeric_key(&self) -> Option<NumericKey> {
        match self {
            Value::Int(v) => Some(NumericKey::from_int(*v)),
            Value::Float(v) => Some(NumericKey::from_float(*v)),
            Value::Decimal(v) => Some(NumericKey::from_decimal(*v)),
            _ => None,
        }
    }
}

/// Serializes a nested value with object keys in sorted order.
///
/// `serde_json::Value` keeps objects in a `BTreeMap`, so compact
/// serialization is already key-sorted at every depth.
pub fn canonical_json(value: &serde_json::Value) -> String {
    value.to_string()
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.numeric_key(), other.numeric_key()) {
            return a == b;
        }
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::TimestampTz(a), Value::TimestampTz(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Nested(a), Value::Nested(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // All numeric kinds share one tag so equal numbers hash alike
        match self {
            Value::Int(v) => {
                0u8.hash(state);
                NumericKey::from_int(*v).hash(state);
            }
            Value::Float(v) => {
                0u8.hash(state);
                NumericKey::from_float(*v).hash(state);
            }
            Value::Decimal(v) => {
                0u8.hash(state);
                NumericKey::from_decimal(*v).hash(state);
            }
            Value::Null => 1u8.hash(state),
            Value::Bool(b) => {
                2u8.hash(state);
                b.hash(state);
            }
            Value::Text(s) => {
                3u8.hash(state);
                s.hash(state);
            }
            Value::Date(d) => {
                4u8.hash(state);
                d.hash(state);
            }
            Value::Timestamp(ts) => {
                5u8.hash(state);
                ts.hash(state);
            }
            Value::TimestampTz(ts) => {
                6u8.hash(state);
                ts.hash(state);
            }
            Value::Time(t) => {
                7u8.hash(state);
                t.hash(state);
            }
            Value::Nested(v) => {
                8u8.hash(state);
                canonical_json(v).hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Text(s) => write!(f, "'{}'", s),
            Value::Date(d) => write!(f, "{}", d),
            Value::Timestamp(ts) => write!(f, "{}", ts),
            Value::TimestampTz(ts) => write!(f, "{}", ts),
            Value::Time(t) => write!(f, "{}", t),
            Value::Nested(v) => write!(f, "{}", canonical_json(v)),
        }
    }
}

/// Renders a row as `(v1, v2, ...)` for logs
pub fn format_row(row: &[Value]) -> String {
    let parts: Vec<String> = row.iter().map(|v| v.to_string()).collect();
    format!("({})", parts.join(", "))
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Nested(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
