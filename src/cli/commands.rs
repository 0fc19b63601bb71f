//! CLI command implementations
//!
//! One-shot commands read a single JSON request from stdin and write a
//! single JSON response to stdout. `evaluate` reads a dataset file and
//! writes the report next to it.

use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::backend::PgConnector;
use crate::cost::cheaper;
use crate::equivalence::default_check;
use crate::eval::{self, StatementField};
use crate::keywords::uses_required;
use crate::observability::Logger;
use crate::sanitize::sanitize;
use crate::session::Session;

use super::args::Command;
use super::config::Config;
use super::errors::CliResult;
use super::io::{read_request, write_response};

/// `compare` request
#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub predicted: StatementField,
    pub reference: StatementField,
    #[serde(default)]
    pub decimal_places: Option<u32>,
}

/// `cost` request
#[derive(Debug, Deserialize)]
pub struct CostRequest {
    pub candidate: StatementField,
    pub reference: StatementField,
}

/// `sanitize` request
#[derive(Debug, Deserialize)]
pub struct SanitizeRequest {
    pub statements: StatementField,
}

/// `uses` request
#[derive(Debug, Deserialize)]
pub struct UsesRequest {
    pub statements: StatementField,
    pub keywords: Vec<String>,
}

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Evaluate {
            config,
            jsonl,
            limit,
            workers,
            write_status,
        } => evaluate(&config, &jsonl, limit, workers, write_status),
        Command::Compare { config, database } => compare(&config, &database),
        Command::Cost { config, database } => cost(&config, &database),
        Command::Sanitize => write_response(sanitize_response(&read_request()?)),
        Command::Uses => write_response(uses_response(&read_request()?)),
    }
}

fn load_config(config_path: &Path) -> CliResult<Config> {
    let config = Config::load(config_path)?;
    Logger::set_min_severity(config.severity()?);
    Ok(config)
}

/// Grade a dataset with `workers` workers and write `<stem>_report.txt`
/// (and optionally `<stem>_output_with_status.jsonl`)
pub fn evaluate(
    config_path: &Path,
    dataset: &Path,
    limit: Option<usize>,
    workers: usize,
    write_status: bool,
) -> CliResult<()> {
    let config = load_config(config_path)?;

    let mut instances = eval::load_jsonl(dataset)?;
    if let Some(limit) = limit {
        instances.truncate(limit);
    }

    let connector = PgConnector::new(config.pg_settings());
    let run = eval::evaluate(&connector, &instances, workers);

    let report = eval::report_path(dataset);
    eval::write_report(&report, &run.summary, &run.results)?;

    let status = if write_status {
        let path = eval::status_path(dataset);
        eval::write_status(&path, &instances, &run.results)?;
        Some(path.display().to_string())
    } else {
        None
    };

    write_response(json!({
        "run_id": run.run_id,
        "summary": run.summary,
        "report": report.display().to_string(),
        "status_file": status,
    }))
}

/// Compare predicted and reference results on `database`
pub fn compare(config_path: &Path, database: &str) -> CliResult<()> {
    let config = load_config(config_path)?;
    let request: CompareRequest = read_request()?;

    let mut session = PgConnector::new(config.pg_settings()).open(database)?;
    write_response(compare_response(&request, database, &mut session))
}

/// Compare candidate and reference plan costs on `database`
pub fn cost(config_path: &Path, database: &str) -> CliResult<()> {
    let config = load_config(config_path)?;
    let request: CostRequest = read_request()?;

    let mut session = PgConnector::new(config.pg_settings()).open(database)?;
    write_response(cost_response(&request, database, &mut session))
}

pub fn compare_response<S: Session + ?Sized>(
    request: &CompareRequest,
    database: &str,
    session: &mut S,
) -> Value {
    let verdict = default_check(
        &request.predicted.statements(),
        &request.reference.statements(),
        database,
        session,
        request.decimal_places,
    );
    json!({ "verdict": verdict })
}

pub fn cost_response<S: Session + ?Sized>(
    request: &CostRequest,
    database: &str,
    session: &mut S,
) -> Value {
    let verdict = cheaper(
        &request.candidate.statements(),
        &request.reference.statements(),
        database,
        session,
    );
    json!({ "verdict": verdict })
}

pub fn sanitize_response(request: &SanitizeRequest) -> Value {
    json!({ "statements": sanitize(&request.statements.statements()) })
}

pub fn uses_response(request: &UsesRequest) -> Value {
    let verdict = uses_required(&request.statements.statements(), &request.keywords);
    json!({ "verdict": verdict })
}
