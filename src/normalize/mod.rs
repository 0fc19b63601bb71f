//! Result normalization
//!
//! Canonicalizes raw result rows so that two executions of semantically
//! equivalent queries produce comparable rows.
//!
//! # Rules
//!
//! 1. Dates and timestamps render as `YYYY-MM-DD` text (time of day dropped)
//! 2. Nested values render as compact JSON text with sorted keys
//! 3. Quantization (optional, separate step) rounds decimals and floats half
//!    away from zero; integers and non-numeric values pass through
//!
//! Neither step reorders rows or columns, and both are idempotent.

use crate::value::{canonical_json, round_decimal, round_float, Row, Value};

/// Date format for canonical temporal values
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Normalizes every row of a result set
pub fn normalize(rows: &[Row]) -> Vec<Row> {
    rows.iter()
        .map(|row| row.iter().map(normalize_value).collect())
        .collect()
}

/// Normalizes a single value
pub fn normalize_value(value: &Value) -> Value {
    match value {
        Value::Date(d) => Value::Text(d.format(DATE_FORMAT).to_string()),
        Value::Timestamp(ts) => Value::Text(ts.format(DATE_FORMAT).to_string()),
        // Date as seen in the offset the engine returned
        Value::TimestampTz(ts) => Value::Text(ts.format(DATE_FORMAT).to_string()),
        Value::Nested(v) => Value::Text(canonical_json(v)),
        other => other.clone(),
    }
}

/// Quantizes decimal and float values to `decimal_places` fractional digits.
///
/// `None` leaves the rows unchanged. Only top-level scalars are touched;
/// numbers inside nested values were already serialized by `normalize`.
pub fn quantize(rows: &[Row], decimal_places: Option<u32>) -> Vec<Row> {
    match decimal_places {
        None => rows.to_vec(),
        Some(places) => rows
            .iter()
            .map(|row| row.iter().map(|v| quantize_value(v, places)).collect())
            .collect(),
    }
}

/// Quantizes a single value
pub fn quantize_value(value: &Value, places: u32) -> Value {
    match value {
        Value::Decimal(d) => Value::Decimal(round_decimal(*d, places)),
        Value::Float(f) => Value::Float(round_float(*f, places)),
        other => other.clone(),
    }
}
