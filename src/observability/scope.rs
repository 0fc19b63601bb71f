//! ObservationScope for automatic begin/complete logging
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` or `{name}_FAILED` when closed
//! - Logs `{name}_INCOMPLETE` on drop if never closed

use std::cell::Cell;

use super::logger::Logger;

/// A scope that automatically logs begin and complete events
///
/// ```ignore
/// let scope = ObservationScope::with_fields("COST_MEASURE", &[("side", "candidate")]);
/// // ... measure ...
/// scope.complete_with_fields(&[("total_cost", "42.0")]);
/// ```
pub struct ObservationScope<'a> {
    name: &'a str,
    completed: Cell<bool>,
    fields: Vec<(&'a str, String)>,
}

impl<'a> ObservationScope<'a> {
    /// Create a new observation scope; logs `{name}_BEGIN` immediately.
    pub fn new(name: &'a str) -> Self {
        Self::with_fields(name, &[])
    }

    /// Create a new observation scope carrying fields on every event it logs
    pub fn with_fields(name: &'a str, fields: &[(&'a str, &str)]) -> Self {
        let event = format!("{}_BEGIN", name);
        Logger::info(&event, fields);

        Self {
            name,
            completed: Cell::new(false),
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
        }
    }

    fn field_refs(&self) -> Vec<(&str, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect()
    }

    /// Mark the scope as successfully completed
    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    /// Mark the scope as completed with additional fields
    pub fn complete_with_fields(self, extra_fields: &[(&str, &str)]) {
        self.completed.set(true);
        let event = format!("{}_COMPLETE", self.name);

        let mut all_fields = self.field_refs();
        all_fields.extend(extra_fields.iter().copied());

        Logger::info(&event, &all_fields);
    }

    /// Mark the scope as failed with a reason; logs `{name}_FAILED` at WARN.
    ///
    /// A failed grading step is an expected outcome, not an operational error.
    pub fn fail(self, reason: &str) {
        self.completed.set(true);
        let event = format!("{}_FAILED", self.name);

        let mut all_fields = self.field_refs();
        all_fields.push(("reason", reason));

        Logger::warn(&event, &all_fields);
    }

    /// Check if the scope has been closed
    pub fn is_completed(&self) -> bool {
        self.completed.get()
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.completed.get() {
            let event = format!("{}_INCOMPLETE", self.name);
            Logger::warn(&event, &[("reason", "scope dropped without completion")]);
        }
    }
}

/// A simple duration timer for logging elapsed time
pub struct Timer {
    start: std::time::Instant,
}

impl Timer {
    /// Create a new timer
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }

    /// Get elapsed milliseconds as a string
    pub fn elapsed_ms(&self) -> String {
        self.start.elapsed().as_millis().to_string()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
