//! Evaluation driver errors
//!
//! Grading failures never surface here; they end up in an instance's status.
//! These errors cover the dataset and report files around a run.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type EvalResult<T> = Result<T, EvalError>;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("cannot read dataset {path}: {source}")]
    ReadDataset {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid instance on line {line}: {source}")]
    InvalidInstance {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("dataset {0} contains no instances")]
    EmptyDataset(PathBuf),

    #[error("cannot write {path}: {source}")]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot encode instance {id}: {source}")]
    Encode {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}
