//! Observability for sqlgrade
//!
//! - Structured logging (JSON lines on stderr)
//! - Begin/complete scopes with elapsed timers
//!
//! # Principles
//!
//! 1. Observability is read-only: logging never changes a verdict
//! 2. Deterministic output (sorted field keys)
//! 3. No background threads
//!
//! ```ignore
//! use sqlgrade::observability::{Logger, ObservationScope};
//!
//! Logger::info("EQUIVALENCE_PASS", &[("database", "shop")]);
//!
//! let scope = ObservationScope::new("INSTANCE");
//! scope.complete();
//! ```

mod logger;
mod scope;

pub use logger::{Logger, Severity};
pub use scope::{ObservationScope, Timer};

/// Truncates long SQL or values for log fields, on a char boundary
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_short_text_unchanged() {
        assert_eq!(preview("SELECT 1", 20), "SELECT 1");
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("SELECT 'héllo'", 9), "SELECT 'h...");
    }
}
