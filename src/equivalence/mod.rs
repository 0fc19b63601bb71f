//! Execution-based answer equivalence
//!
//! Two statement lists are equivalent when the final result sets they
//! produce, after normalization and optional quantization, contain the same
//! rows.
//!
//! # Rules
//!
//! 1. An empty statement list on either side fails without executing anything
//! 2. An execution error or timeout on either side fails
//! 3. An empty (normalized) result on either side fails
//! 4. Rows are compared as sets: row order and row multiplicity are ignored
//!
//! Rule 4 means a prediction that duplicates rows (for example through a
//! missing join condition) still matches a reference without duplicates.

use std::collections::HashSet;

use crate::normalize::{normalize, quantize};
use crate::observability::Logger;
use crate::sanitize::sanitize;
use crate::session::{execute_statements, Session};
use crate::value::Row;
use crate::verdict::Verdict;

/// Why a comparison failed; logged, never returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mismatch {
    EmptyInput,
    PredictedUnusable,
    ReferenceUnusable,
    EmptyResult,
    RowsDiffer,
}

impl Mismatch {
    fn as_str(&self) -> &'static str {
        match self {
            Mismatch::EmptyInput => "empty_input",
            Mismatch::PredictedUnusable => "predicted_execution_failed",
            Mismatch::ReferenceUnusable => "reference_execution_failed",
            Mismatch::EmptyResult => "empty_result",
            Mismatch::RowsDiffer => "rows_differ",
        }
    }
}

fn fail(database: &str, reason: Mismatch) -> Verdict {
    Logger::info(
        "EQUIVALENCE_FAIL",
        &[("database", database), ("reason", reason.as_str())],
    );
    Verdict::Fail
}

/// Compares the results of `predicted` and `reference` on `session`.
///
/// Statements are executed as given; sanitizing is the caller's job
/// (see [`default_check`]).
pub fn equivalent<S, P, R>(
    predicted: &[P],
    reference: &[R],
    database: &str,
    session: &mut S,
    decimal_places: Option<u32>,
) -> Verdict
where
    S: Session + ?Sized,
    P: AsRef<str>,
    R: AsRef<str>,
{
    if predicted.is_empty() || reference.is_empty() {
        return fail(database, Mismatch::EmptyInput);
    }

    let predicted_outcome = execute_statements(session, database, predicted);
    let reference_outcome = execute_statements(session, database, reference);

    if !predicted_outcome.is_usable() {
        return fail(database, Mismatch::PredictedUnusable);
    }
    if !reference_outcome.is_usable() {
        return fail(database, Mismatch::ReferenceUnusable);
    }

    match compare_rows(&predicted_outcome.rows, &reference_outcome.rows, decimal_places) {
        Ok(()) => {
            Logger::info("EQUIVALENCE_PASS", &[("database", database)]);
            Verdict::Pass
        }
        Err(reason) => fail(database, reason),
    }
}

/// Compares two already-executed result sets.
pub fn result_sets_match(
    predicted: &[Row],
    reference: &[Row],
    decimal_places: Option<u32>,
) -> Verdict {
    compare_rows(predicted, reference, decimal_places).is_ok().into()
}

fn compare_rows(
    predicted: &[Row],
    reference: &[Row],
    decimal_places: Option<u32>,
) -> Result<(), Mismatch> {
    let predicted = normalize(predicted);
    let reference = normalize(reference);
    if predicted.is_empty() || reference.is_empty() {
        return Err(Mismatch::EmptyResult);
    }

    let predicted = quantize(&predicted, decimal_places);
    let reference = quantize(&reference, decimal_places);

    let predicted: HashSet<Row> = predicted.into_iter().collect();
    let reference: HashSet<Row> = reference.into_iter().collect();

    if predicted == reference {
        Ok(())
    } else {
        Err(Mismatch::RowsDiffer)
    }
}

/// The default grading check: strip comments and `DISTINCT` from both lists,
/// then compare results.
pub fn default_check<S, P, R>(
    predicted: &[P],
    reference: &[R],
    database: &str,
    session: &mut S,
    decimal_places: Option<u32>,
) -> Verdict
where
    S: Session + ?Sized,
    P: AsRef<str>,
    R: AsRef<str>,
{
    let predicted = sanitize(predicted);
    let reference = sanitize(reference);
    equivalent(&predicted, &reference, database, session, decimal_places)
}
