//! CLI module for sqlgrade
//!
//! Provides command-line interface for:
//! - evaluate: Grade a JSONL dataset and write a report
//! - compare: One-shot result comparison
//! - cost: One-shot plan-cost comparison
//! - sanitize: Comment and DISTINCT stripping
//! - uses: Keyword usage check

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{
    compare, compare_response, cost, cost_response, evaluate, run, run_command, sanitize_response,
    uses_response, CompareRequest, CostRequest, SanitizeRequest, UsesRequest,
};
pub use config::Config;
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_request, write_error, write_response};
