//! Session error types

use thiserror::Error;

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Failure while running one SQL text on a session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The statement failed: syntax, constraint violation, missing object
    #[error("Execution error: {0}")]
    Execution(String),

    /// The engine cancelled the statement after its time budget
    #[error("Statement timeout: {0}")]
    Timeout(String),

    /// The connection itself is unusable
    #[error("Connection error: {0}")]
    Connection(String),
}

impl SessionError {
    /// Returns true for timeouts
    pub fn is_timeout(&self) -> bool {
        matches!(self, SessionError::Timeout(_))
    }

    /// Short category name for log fields
    pub fn category(&self) -> &'static str {
        match self {
            SessionError::Execution(_) => "execution",
            SessionError::Timeout(_) => "timeout",
            SessionError::Connection(_) => "connection",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_classification() {
        assert!(SessionError::Timeout("57014".into()).is_timeout());
        assert!(!SessionError::Execution("syntax".into()).is_timeout());
        assert!(!SessionError::Connection("closed".into()).is_timeout());
    }

    #[test]
    fn test_display() {
        let err = SessionError::Execution("relation \"t\" does not exist".into());
        assert_eq!(err.to_string(), "Execution error: relation \"t\" does not exist");
        assert_eq!(err.category(), "execution");
    }
}
