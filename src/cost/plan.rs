//! Plan inspection: `EXPLAIN (FORMAT JSON)` wrapping and cost extraction

use serde_json::Value as Json;

use super::errors::{PlanError, PlanResult};
use crate::value::{Row, Value};

/// Statement kinds whose cost is measured
const COST_BEARING: [&str; 4] = ["SELECT", "INSERT", "UPDATE", "DELETE"];

/// Returns true if the trimmed, upper-cased statement starts with a
/// data-manipulation verb.
///
/// Prefix match only: `WITH ... SELECT` is not measured.
pub fn is_cost_bearing(sql: &str) -> bool {
    let upper = sql.trim().to_uppercase();
    COST_BEARING.iter().any(|verb| upper.starts_with(verb))
}

/// Wraps `sql` in the machine-readable plan-inspection form
pub fn explain_sql(sql: &str) -> String {
    format!("EXPLAIN (FORMAT JSON) {}", sql)
}

/// Extracts the root plan's total estimated cost from EXPLAIN output.
///
/// Expects row 0, column 0 to hold the JSON plan list, either as a decoded
/// document or as text.
pub fn plan_total_cost(rows: &[Row]) -> PlanResult<f64> {
    let cell = rows
        .first()
        .and_then(|row| row.first())
        .ok_or(PlanError::NoRows)?;

    let parsed;
    let plan: &Json = match cell {
        Value::Nested(json) => json,
        Value::Text(text) => {
            parsed = serde_json::from_str::<Json>(text)
                .map_err(|e| PlanError::Malformed(format!("invalid JSON: {}", e)))?;
            &parsed
        }
        other => {
            return Err(PlanError::Malformed(format!(
                "expected JSON plan, got {}",
                other.kind()
            )))
        }
    };

    let root = plan
        .as_array()
        .and_then(|entries| entries.first())
        .ok_or_else(|| PlanError::Malformed("expected a non-empty plan list".to_string()))?;

    let cost = root
        .get("Plan")
        .and_then(|p| p.get("Total Cost"))
        .and_then(Json::as_f64)
        .ok_or(PlanError::MissingCost)?;

    if !cost.is_finite() || cost < 0.0 {
        return Err(PlanError::Malformed(format!("invalid total cost {}", cost)));
    }
    Ok(cost)
}
