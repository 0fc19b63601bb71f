//! Configuration file
//!
//! A JSON object; every field is optional:
//!
//! ```json
//! {
//!   "host": "localhost",
//!   "port": 5432,
//!   "user": "root",
//!   "password": "secret",
//!   "maintenance_database": "postgres",
//!   "statement_timeout_secs": 60,
//!   "max_rows": 10000,
//!   "template_suffix": "_template",
//!   "reset_after_instance": true,
//!   "log_level": "info"
//! }
//! ```
//!
//! Without `password`, `PGPASSWORD` is used when set.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::{CliError, CliResult};
use crate::backend::PgSettings;
use crate::observability::Severity;

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default)]
    pub password: Option<String>,

    /// Database for drop/create during resets
    #[serde(default = "default_maintenance_database")]
    pub maintenance_database: String,

    /// Per-statement time budget (default 60s)
    #[serde(default = "default_statement_timeout_secs")]
    pub statement_timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Row cap for SELECT/WITH results (default 10000)
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    #[serde(default = "default_template_suffix")]
    pub template_suffix: String,

    /// Recreate each graded database from `<name><template_suffix>` after
    /// every instance (default true)
    #[serde(default = "default_reset_after_instance")]
    pub reset_after_instance: bool,

    /// trace, info, warn or error
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    5432
}
fn default_user() -> String {
    "root".to_string()
}
fn default_maintenance_database() -> String {
    "postgres".to_string()
}
fn default_statement_timeout_secs() -> u64 {
    60
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_max_rows() -> usize {
    10000
}
fn default_template_suffix() -> String {
    "_template".to_string()
}
fn default_reset_after_instance() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: None,
            maintenance_database: default_maintenance_database(),
            statement_timeout_secs: default_statement_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_rows: default_max_rows(),
            template_suffix: default_template_suffix(),
            reset_after_instance: default_reset_after_instance(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        Self::parse(&content)
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> CliResult<Self> {
        let config: Config = serde_json::from_str(content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.host.trim().is_empty() {
            return Err(CliError::config_error("host must not be empty"));
        }

        if self.port == 0 {
            return Err(CliError::config_error("port must be > 0"));
        }

        if self.statement_timeout_secs == 0 {
            return Err(CliError::config_error("statement_timeout_secs must be > 0"));
        }

        if self.connect_timeout_secs == 0 {
            return Err(CliError::config_error("connect_timeout_secs must be > 0"));
        }

        if self.max_rows == 0 {
            return Err(CliError::config_error("max_rows must be > 0"));
        }

        if self.reset_after_instance && self.template_suffix.is_empty() {
            return Err(CliError::config_error(
                "template_suffix must not be empty when reset_after_instance is set",
            ));
        }

        self.severity()?;

        Ok(())
    }

    /// Minimum log severity
    pub fn severity(&self) -> CliResult<Severity> {
        Severity::parse(&self.log_level).ok_or_else(|| {
            CliError::config_error(format!(
                "Invalid log_level: '{}'. Expected trace, info, warn or error.",
                self.log_level
            ))
        })
    }

    /// Connection settings, with the password taken from `PGPASSWORD` when
    /// the file has none
    pub fn pg_settings(&self) -> PgSettings {
        PgSettings {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self
                .password
                .clone()
                .or_else(|| std::env::var("PGPASSWORD").ok()),
            maintenance_database: self.maintenance_database.clone(),
            statement_timeout_secs: self.statement_timeout_secs,
            max_rows: self.max_rows,
            connect_timeout_secs: self.connect_timeout_secs,
            template_suffix: self.template_suffix.clone(),
            reset_after_instance: self.reset_after_instance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse("{}").unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.user, "root");
        assert_eq!(config.statement_timeout_secs, 60);
        assert_eq!(config.max_rows, 10000);
        assert_eq!(config.template_suffix, "_template");
        assert!(config.reset_after_instance);
        assert_eq!(config.severity().unwrap(), Severity::Info);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sqlgrade.json");
        fs::write(&path, r#"{"host": "db.internal", "port": 6543, "password": "pw"}"#).unwrap();

        let config = Config::load(&path).unwrap();
        let settings = config.pg_settings();
        assert_eq!(settings.host, "db.internal");
        assert_eq!(settings.port, 6543);
        assert_eq!(settings.password.as_deref(), Some("pw"));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Path::new("/nonexistent/sqlgrade.json")).unwrap_err();
        assert_eq!(err.code_str(), "SQLGRADE_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_invalid_values() {
        assert!(Config::parse(r#"{"port": 0}"#).is_err());
        assert!(Config::parse(r#"{"statement_timeout_secs": 0}"#).is_err());
        assert!(Config::parse(r#"{"max_rows": 0}"#).is_err());
        assert!(Config::parse(r#"{"log_level": "verbose"}"#).is_err());
        assert!(Config::parse(r#"{"reset_after_instance": true, "template_suffix": ""}"#).is_err());
        assert!(Config::parse(r#"{"template_suffix": ""}"#).is_err());
        assert!(Config::parse(r#"{"data_dir": "/tmp"}"#).is_err());
        assert!(Config::parse("not json").is_err());
    }

    #[test]
    fn test_reset_can_be_disabled() {
        let config = Config::parse(r#"{"reset_after_instance": false, "template_suffix": ""}"#).unwrap();
        assert!(!config.pg_settings().reset_after_instance);
    }
}
