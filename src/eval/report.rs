//! Run summary, report file, and status file

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value as Json;

use super::dataset::Instance;
use super::errors::{EvalError, EvalResult};
use super::runner::InstanceResult;

const RULE: &str = "--------------------------------------------------";

/// Aggregate counts over one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub instances: usize,
    pub execution_errors: usize,
    pub timeouts: usize,
    pub assertion_errors: usize,
    pub total_errors: usize,
    /// Percentage of instances without any error flag
    pub accuracy: f64,
    pub timestamp: String,
}

impl Summary {
    pub fn from_results(results: &[InstanceResult], timestamp: String) -> Self {
        let count = |flag: fn(&InstanceResult) -> bool| results.iter().filter(|r| flag(r)).count();

        let instances = results.len();
        let execution_errors = count(|r| r.execution_error);
        let timeouts = count(|r| r.timeout_error);
        let assertion_errors = count(|r| r.assertion_error);
        let total_errors = execution_errors + timeouts + assertion_errors;

        let accuracy = if instances == 0 {
            0.0
        } else {
            instances.saturating_sub(total_errors) as f64 / instances as f64 * 100.0
        };

        Self {
            instances,
            execution_errors,
            timeouts,
            assertion_errors,
            total_errors,
            accuracy,
            timestamp,
        }
    }
}

/// `<dir>/<stem><suffix>` next to the dataset file
pub fn sibling_path(dataset: &Path, suffix: &str) -> PathBuf {
    let mut path = dataset.with_extension("").into_os_string();
    path.push(suffix);
    PathBuf::from(path)
}

pub fn report_path(dataset: &Path) -> PathBuf {
    sibling_path(dataset, "_report.txt")
}

pub fn status_path(dataset: &Path) -> PathBuf {
    sibling_path(dataset, "_output_with_status.jsonl")
}

/// Renders the human-readable report
pub fn render_report(summary: &Summary, results: &[InstanceResult]) -> String {
    let mut out = String::new();
    out.push_str(RULE);
    out.push('\n');
    out.push_str("SQL Evaluation Result Statistics (PostgreSQL):\n");
    out.push_str(&format!("Number of Instances: {}\n", summary.instances));
    out.push_str(&format!("Number of Execution Errors: {}\n", summary.execution_errors));
    out.push_str(&format!("Number of Timeouts: {}\n", summary.timeouts));
    out.push_str(&format!("Number of Assertion Errors: {}\n", summary.assertion_errors));
    out.push_str(&format!("Total Errors: {}\n", summary.total_errors));
    out.push_str(&format!("Overall Accuracy: {:.2}%\n", summary.accuracy));
    out.push_str(&format!("Timestamp: {}\n\n", summary.timestamp));

    for result in results {
        let failed = if result.failed_test_cases.is_empty() {
            "None".to_string()
        } else {
            result.failed_test_cases.join(", ")
        };
        out.push_str(&format!(
            "Question_{}: ({}/{}) test cases passed, failed test cases: {}{}\n",
            result.instance_id,
            result.passed_test_cases,
            result.total_test_cases,
            failed,
            result.phase_notes()
        ));
    }
    out
}

pub fn write_report(path: &Path, summary: &Summary, results: &[InstanceResult]) -> EvalResult<()> {
    fs::write(path, render_report(summary, results)).map_err(|source| EvalError::WriteOutput {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes every instance back as JSONL with `status` and `error_message`.
///
/// `instances` and `results` are paired by position.
pub fn write_status(path: &Path, instances: &[Instance], results: &[InstanceResult]) -> EvalResult<()> {
    let write_err = |source: std::io::Error| EvalError::WriteOutput {
        path: path.to_path_buf(),
        source,
    };

    let mut file = fs::File::create(path).map_err(write_err)?;
    for (instance, result) in instances.iter().zip(results) {
        let mut record = serde_json::to_value(instance).map_err(|source| EvalError::Encode {
            id: instance.instance_id.to_string(),
            source,
        })?;
        if let Json::Object(map) = &mut record {
            map.insert("status".to_string(), serde_json::to_value(result.status).unwrap_or(Json::Null));
            map.insert(
                "error_message".to_string(),
                result.error_message.clone().map(Json::String).unwrap_or(Json::Null),
            );
        }
        writeln!(file, "{}", record).map_err(write_err)?;
    }
    Ok(())
}
