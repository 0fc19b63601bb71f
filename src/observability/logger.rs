//! Structured JSON logger
//!
//! - One log line = one event
//! - `event` first, then `severity`, then fields sorted by key
//! - Synchronous, no buffering
//! - Written to stderr; stdout carries CLI responses only

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU8, Ordering};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Per-statement detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues
    Warn = 2,
    /// Operation failures
    Error = 3,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }

    /// Parses a configuration level name (case-insensitive)
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "trace" => Some(Severity::Trace),
            "info" => Some(Severity::Info),
            "warn" => Some(Severity::Warn),
            "error" => Some(Severity::Error),
            _ => None,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => Severity::Trace,
            1 => Severity::Info,
            2 => Severity::Warn,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static MIN_SEVERITY: AtomicU8 = AtomicU8::new(Severity::Info as u8);

/// A structured logger that outputs JSON lines
pub struct Logger;

impl Logger {
    /// Sets the lowest severity that is emitted
    pub fn set_min_severity(severity: Severity) {
        MIN_SEVERITY.store(severity as u8, Ordering::Relaxed);
    }

    /// Returns the lowest severity that is emitted
    pub fn min_severity() -> Severity {
        Severity::from_u8(MIN_SEVERITY.load(Ordering::Relaxed))
    }

    /// Log an event with the given severity and fields
    ///
    /// Fields are output in deterministic order (alphabetical by key)
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if severity < Self::min_severity() {
            return;
        }
        Self::log_to_writer(severity, event, fields, &mut io::stderr());
    }

    fn log_to_writer<W: Write>(
        severity: Severity,
        event: &str,
        fields: &[(&str, &str)],
        writer: &mut W,
    ) {
        let mut output = String::with_capacity(256);

        output.push('{');

        output.push_str("\"event\":\"");
        Self::escape_json_string(&mut output, event);
        output.push('"');

        output.push_str(",\"severity\":\"");
        output.push_str(severity.as_str());
        output.push('"');

        let mut sorted_fields: Vec<_> = fields.iter().collect();
        sorted_fields.sort_by_key(|(k, _)| *k);

        for (key, value) in sorted_fields {
            output.push_str(",\"");
            Self::escape_json_string(&mut output, key);
            output.push_str("\":\"");
            Self::escape_json_string(&mut output, value);
            output.push('"');
        }

        output.push('}');
        output.push('\n');

        // One write per line
        let _ = writer.write_all(output.as_bytes());
        let _ = writer.flush();
    }

    fn escape_json_string(output: &mut String, s: &str) {
        for c in s.chars() {
            match c {
                '"' => output.push_str("\\\""),
                '\\' => output.push_str("\\\\"),
                '\n' => output.push_str("\\n"),
                '\r' => output.push_str("\\r"),
                '\t' => output.push_str("\\t"),
                c if c.is_control() => {
                    output.push_str(&format!("\\u{:04x}", c as u32));
                }
                c => output.push(c),
            }
        }
    }

    /// Log at TRACE level
    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Trace, event, fields);
    }

    /// Log at INFO level
    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    /// Log at WARN level
    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    /// Log at ERROR level
    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }
}

/// Capture logs to a buffer for testing
#[cfg(test)]
pub fn capture_log(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let mut buffer = Vec::new();
    Logger::log_to_writer(severity, event, fields, &mut buffer);
    String::from_utf8(buffer).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Trace < Severity::Info);
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("TRACE"), Some(Severity::Trace));
        assert_eq!(Severity::parse("warn"), Some(Severity::Warn));
        assert_eq!(Severity::parse("fatal"), None);
    }

    #[test]
    fn test_log_json_format() {
        let output = capture_log(Severity::Info, "EQUIVALENCE_PASS", &[]);

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["event"], "EQUIVALENCE_PASS");
        assert_eq!(parsed["severity"], "INFO");
    }

    #[test]
    fn test_log_deterministic_ordering() {
        let output1 = capture_log(
            Severity::Info,
            "COST_TOTAL",
            &[("side", "reference"), ("database", "shop"), ("cost", "12.5")],
        );
        let output2 = capture_log(
            Severity::Info,
            "COST_TOTAL",
            &[("cost", "12.5"), ("side", "reference"), ("database", "shop")],
        );

        assert_eq!(output1, output2);

        let cost_pos = output1.find("\"cost\"").unwrap();
        let database_pos = output1.find("\"database\"").unwrap();
        let side_pos = output1.find("\"side\"").unwrap();
        assert!(cost_pos < database_pos);
        assert!(database_pos < side_pos);
    }

    #[test]
    fn test_log_escapes_sql_text() {
        let sql = "SELECT \"a\"\nFROM t -- note";
        let output = capture_log(Severity::Trace, "STATEMENT_EXECUTE", &[("sql", sql)]);

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["sql"], sql);
        assert_eq!(output.chars().filter(|c| *c == '\n').count(), 1);
    }
}
