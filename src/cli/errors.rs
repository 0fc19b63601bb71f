//! CLI-specific error types
//!
//! All CLI errors end the process with a non-zero exit code

use std::fmt;
use std::io;

use crate::eval::EvalError;
use crate::session::SessionError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdin/stdout)
    IoError,
    /// Database unreachable
    ConnectError,
    /// Dataset or report file error
    DatasetError,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "SQLGRADE_CLI_CONFIG_ERROR",
            Self::IoError => "SQLGRADE_CLI_IO_ERROR",
            Self::ConnectError => "SQLGRADE_CLI_CONNECT_ERROR",
            Self::DatasetError => "SQLGRADE_CLI_DATASET_ERROR",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn connect_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConnectError, msg)
    }

    pub fn dataset_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::DatasetError, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<EvalError> for CliError {
    fn from(e: EvalError) -> Self {
        Self::dataset_error(e.to_string())
    }
}

impl From<SessionError> for CliError {
    fn from(e: SessionError) -> Self {
        Self::connect_error(e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
