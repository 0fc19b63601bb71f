//! JSONL dataset of graded instances
//!
//! Each line is one JSON object. Statement fields accept a single string or
//! a list of strings. Unknown fields are kept so a status file can echo the
//! instance back unchanged.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use super::checks::TestCase;
use super::errors::{EvalError, EvalResult};

/// A statement list as written in the dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatementField {
    One(String),
    Many(Vec<String>),
}

impl StatementField {
    /// The statements in order; an empty string means no statements
    pub fn statements(&self) -> Vec<String> {
        match self {
            StatementField::One(sql) if sql.is_empty() => Vec::new(),
            StatementField::One(sql) => vec![sql.clone()],
            StatementField::Many(list) => list.clone(),
        }
    }
}

fn statements_of(field: &Option<StatementField>) -> Vec<String> {
    field.as_ref().map(StatementField::statements).unwrap_or_default()
}

/// Instance identifier, numeric or textual
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InstanceId {
    Number(i64),
    Text(String),
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceId::Number(n) => write!(f, "{}", n),
            InstanceId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One graded question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub instance_id: InstanceId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_database: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preprocess_sql: Option<StatementField>,

    /// Reference solution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sol_sql: Option<StatementField>,

    /// Candidate statements under evaluation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pred_sqls: Option<StatementField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_up_sql: Option<StatementField>,

    /// The original problematic statements; baseline for cost checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_sql: Option<StatementField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_cases: Option<Vec<TestCase>>,

    #[serde(flatten)]
    pub extra: Map<String, Json>,
}

/// Fields an instance cannot be graded without
const REQUIRED_FIELDS: [&str; 4] = ["selected_database", "preprocess_sql", "sol_sql", "pred_sqls"];

impl Instance {
    /// Required fields absent from this instance, in declaration order
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let present = [
            self.selected_database.is_some(),
            self.preprocess_sql.is_some(),
            self.sol_sql.is_some(),
            self.pred_sqls.is_some(),
        ];
        REQUIRED_FIELDS
            .iter()
            .zip(present)
            .filter(|(_, present)| !present)
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn database(&self) -> &str {
        self.selected_database.as_deref().unwrap_or_default()
    }

    pub fn preprocess(&self) -> Vec<String> {
        statements_of(&self.preprocess_sql)
    }

    pub fn solution(&self) -> Vec<String> {
        statements_of(&self.sol_sql)
    }

    pub fn predicted(&self) -> Vec<String> {
        statements_of(&self.pred_sqls)
    }

    pub fn clean_up(&self) -> Vec<String> {
        statements_of(&self.clean_up_sql)
    }

    pub fn issue(&self) -> Vec<String> {
        statements_of(&self.issue_sql)
    }

    /// Declared test cases; empty when none were given
    pub fn declared_test_cases(&self) -> &[TestCase] {
        self.test_cases.as_deref().unwrap_or_default()
    }
}

/// Parses one instance per non-blank line
pub fn parse_jsonl(content: &str) -> EvalResult<Vec<Instance>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map_err(|source| EvalError::InvalidInstance { line: i + 1, source })
        })
        .collect()
}

/// Loads a dataset file; a file without instances is an error
pub fn load_jsonl(path: &Path) -> EvalResult<Vec<Instance>> {
    let content = fs::read_to_string(path).map_err(|source| EvalError::ReadDataset {
        path: path.to_path_buf(),
        source,
    })?;

    let instances = parse_jsonl(&content)?;
    if instances.is_empty() {
        return Err(EvalError::EmptyDataset(path.to_path_buf()));
    }
    Ok(instances)
}
