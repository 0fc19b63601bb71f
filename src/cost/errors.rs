//! Plan-inspection errors

use thiserror::Error;

use crate::session::SessionError;

/// Result type for plan inspection
pub type PlanResult<T> = Result<T, PlanError>;

/// Failure to obtain a total cost for one statement
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("Plan inspection failed: {0}")]
    Session(#[from] SessionError),

    #[error("Plan inspection returned no rows")]
    NoRows,

    #[error("Malformed plan: {0}")]
    Malformed(String),

    #[error("Plan has no numeric root \"Total Cost\"")]
    MissingCost,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_session_error() {
        let err: PlanError = SessionError::Execution("syntax error".into()).into();
        assert!(matches!(err, PlanError::Session(_)));
        assert!(err.to_string().contains("syntax error"));
    }
}
