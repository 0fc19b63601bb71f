//! CLI argument definitions using clap
//!
//! Commands:
//! - sqlgrade evaluate --config <path> --jsonl <path> [--limit <n>] [--workers <n>] [--write-status]
//! - sqlgrade compare --config <path> --database <name>
//! - sqlgrade cost --config <path> --database <name>
//! - sqlgrade sanitize
//! - sqlgrade uses

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// sqlgrade - Execution-based SQL answer grading
#[derive(Parser, Debug)]
#[command(name = "sqlgrade")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Grade every instance of a JSONL dataset and write a report
    Evaluate {
        /// Path to configuration file
        #[arg(long, default_value = "./sqlgrade.json")]
        config: PathBuf,

        /// Dataset with one instance per line
        #[arg(long)]
        jsonl: PathBuf,

        /// Grade only the first N instances
        #[arg(long)]
        limit: Option<usize>,

        /// Parallel grading workers; above 1 each works on its own database copies
        #[arg(long, default_value_t = 1, value_parser = parse_workers)]
        workers: usize,

        /// Also write the dataset back with per-instance status
        #[arg(long)]
        write_status: bool,
    },

    /// Compare predicted and reference results read from stdin
    Compare {
        /// Path to configuration file
        #[arg(long, default_value = "./sqlgrade.json")]
        config: PathBuf,

        /// Database to run both statement lists on
        #[arg(long)]
        database: String,
    },

    /// Compare candidate and reference plan costs read from stdin
    Cost {
        /// Path to configuration file
        #[arg(long, default_value = "./sqlgrade.json")]
        config: PathBuf,

        /// Database to measure on
        #[arg(long)]
        database: String,
    },

    /// Strip comments and DISTINCT from statements read from stdin
    Sanitize,

    /// Check keyword usage of statements read from stdin
    Uses,
}

fn parse_workers(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_evaluate() {
        let cli = Cli::try_parse_from([
            "sqlgrade",
            "evaluate",
            "--jsonl",
            "runs/gpt.jsonl",
            "--limit",
            "5",
            "--workers",
            "4",
            "--write-status",
        ])
        .unwrap();
        match cli.command {
            Command::Evaluate {
                config,
                jsonl,
                limit,
                workers,
                write_status,
            } => {
                assert_eq!(config, PathBuf::from("./sqlgrade.json"));
                assert_eq!(jsonl, PathBuf::from("runs/gpt.jsonl"));
                assert_eq!(limit, Some(5));
                assert_eq!(workers, 4);
                assert!(write_status);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_workers_default_and_minimum() {
        let cli = Cli::try_parse_from(["sqlgrade", "evaluate", "--jsonl", "a.jsonl"]).unwrap();
        assert!(matches!(cli.command, Command::Evaluate { workers: 1, .. }));
        assert!(Cli::try_parse_from([
            "sqlgrade", "evaluate", "--jsonl", "a.jsonl", "--workers", "0"
        ])
        .is_err());
    }

    #[test]
    fn test_compare_requires_database() {
        assert!(Cli::try_parse_from(["sqlgrade", "compare"]).is_err());
    }
}
