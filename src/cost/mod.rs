//! Planner-cost comparison between two statement lists
//!
//! Each list is measured inside its own rolled-back transaction on the same
//! session, candidate first and then reference, so neither list sees the
//! other's side effects.
//!
//! # Measurement
//!
//! For each statement of a list, inside its own savepoint:
//! 1. Non-DML (DDL, `SET`, `WITH`, ...) runs directly and is not measured
//! 2. DML runs as `EXPLAIN (FORMAT JSON) <sql>` and adds the root plan's
//!    total cost
//! 3. Any failure is logged, rolled back to the savepoint and contributes
//!    zero; the statements after it are still measured

mod errors;
mod guard;
mod plan;

pub use errors::{PlanError, PlanResult};
pub use guard::TransactionGuard;
pub use plan::{explain_sql, is_cost_bearing, plan_total_cost};

use crate::observability::{preview, Logger, ObservationScope};
use crate::session::{Session, SessionResult};
use crate::verdict::Verdict;

const SQL_PREVIEW_CHARS: usize = 200;

/// Passes when the reference list's total plan cost is strictly lower than
/// the candidate list's.
///
/// Empty input on either side fails without touching the session; so does a
/// failure to open either measurement transaction.
pub fn cheaper<S, C, R>(candidate: &[C], reference: &[R], database: &str, session: &mut S) -> Verdict
where
    S: Session + ?Sized,
    C: AsRef<str>,
    R: AsRef<str>,
{
    if candidate.is_empty() || reference.is_empty() {
        Logger::info(
            "COST_COMPARE_SKIPPED",
            &[("database", database), ("reason", "empty_input")],
        );
        return Verdict::Fail;
    }

    let candidate_cost = match measure_side(session, database, candidate, "candidate") {
        Ok(cost) => cost,
        Err(_) => return Verdict::Fail,
    };
    let reference_cost = match measure_side(session, database, reference, "reference") {
        Ok(cost) => cost,
        Err(_) => return Verdict::Fail,
    };

    let verdict = Verdict::from(reference_cost < candidate_cost);
    Logger::info(
        "COST_COMPARE",
        &[
            ("candidate_cost", &candidate_cost.to_string()),
            ("database", database),
            ("reference_cost", &reference_cost.to_string()),
            ("verdict", &verdict.to_string()),
        ],
    );
    verdict
}

/// Sums the plan costs of `statements` inside a rolled-back transaction.
///
/// Only a failure to open the transaction is returned; statement-level
/// failures are contained.
pub fn measure<S, Q>(session: &mut S, database: &str, statements: &[Q]) -> SessionResult<f64>
where
    S: Session + ?Sized,
    Q: AsRef<str>,
{
    measure_side(session, database, statements, "statements")
}

fn measure_side<S, Q>(
    session: &mut S,
    database: &str,
    statements: &[Q],
    side: &str,
) -> SessionResult<f64>
where
    S: Session + ?Sized,
    Q: AsRef<str>,
{
    let scope = ObservationScope::with_fields("COST_MEASURE", &[("database", database), ("side", side)]);

    let mut tx = match TransactionGuard::begin(session, database) {
        Ok(tx) => tx,
        Err(e) => {
            scope.fail(&e.to_string());
            return Err(e);
        }
    };

    let mut total = 0.0;
    for sql in statements {
        let sql = sql.as_ref();
        if !is_cost_bearing(sql) {
            if let Err(e) = tx.step(|session| session.execute(sql)) {
                Logger::warn(
                    "COST_SETUP_FAILED",
                    &[
                        ("database", database),
                        ("error", &e.to_string()),
                        ("side", side),
                        ("sql", &preview(sql, SQL_PREVIEW_CHARS)),
                    ],
                );
            }
            continue;
        }

        match tx.step(|session| statement_cost(session, sql)) {
            Ok(cost) => {
                Logger::trace(
                    "COST_STATEMENT",
                    &[
                        ("cost", &cost.to_string()),
                        ("side", side),
                        ("sql", &preview(sql, SQL_PREVIEW_CHARS)),
                    ],
                );
                total += cost;
            }
            Err(e) => Logger::warn(
                "COST_STATEMENT_SKIPPED",
                &[
                    ("database", database),
                    ("error", &e.to_string()),
                    ("side", side),
                    ("sql", &preview(sql, SQL_PREVIEW_CHARS)),
                ],
            ),
        }
    }

    // Roll back before the other list is measured
    drop(tx);

    scope.complete_with_fields(&[("total_cost", &total.to_string())]);
    Ok(total)
}

fn statement_cost<S: Session + ?Sized>(session: &mut S, sql: &str) -> PlanResult<f64> {
    let rows = session.execute(&explain_sql(sql))?;
    plan_total_cost(&rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySession;

    #[test]
    fn test_reference_strictly_cheaper_passes() {
        let mut session = MemorySession::new()
            .with_plan_cost("SELECT slow", 100.0)
            .with_plan_cost("SELECT fast", 10.0);
        assert_eq!(
            cheaper(&["SELECT slow"], &["SELECT fast"], "db", &mut session),
            Verdict::Pass
        );
    }

    #[test]
    fn test_equal_cost_fails() {
        let mut session = MemorySession::new()
            .with_plan_cost("SELECT a", 10.0)
            .with_plan_cost("SELECT b", 10.0);
        assert_eq!(cheaper(&["SELECT a"], &["SELECT b"], "db", &mut session), Verdict::Fail);
    }

    #[test]
    fn test_costs_are_summed() {
        let mut session = MemorySession::new()
            .with_plan_cost("SELECT one", 6.0)
            .with_plan_cost("SELECT two", 6.0)
            .with_plan_cost("SELECT single", 10.0);
        let total = measure(&mut session, "db", &["SELECT one", "SELECT two"]).unwrap();
        assert_eq!(total, 12.0);
        assert_eq!(
            cheaper(&["SELECT one", "SELECT two"], &["SELECT single"], "db", &mut session),
            Verdict::Pass
        );
    }

    #[test]
    fn test_empty_input_touches_nothing() {
        let mut session = MemorySession::new();
        assert_eq!(cheaper(&[] as &[&str], &["SELECT 1"], "db", &mut session), Verdict::Fail);
        assert_eq!(cheaper(&["SELECT 1"], &[] as &[&str], "db", &mut session), Verdict::Fail);
        assert!(session.executed().is_empty());
    }

    #[test]
    fn test_non_dml_executed_not_explained() {
        let mut session = MemorySession::new().with_plan_cost("SELECT v FROM items", 3.0);
        let total = measure(
            &mut session,
            "db",
            &["CREATE TABLE items", "SELECT v FROM items"],
        )
        .unwrap();
        assert_eq!(total, 3.0);
        assert_eq!(
            session.executed(),
            &[
                "BEGIN".to_string(),
                "SAVEPOINT cost_step".to_string(),
                "CREATE TABLE items".to_string(),
                "RELEASE SAVEPOINT cost_step".to_string(),
                "SAVEPOINT cost_step".to_string(),
                "EXPLAIN (FORMAT JSON) SELECT v FROM items".to_string(),
                "RELEASE SAVEPOINT cost_step".to_string(),
                "ROLLBACK".to_string(),
            ]
        );
        assert!(!session.has_table("items"));
    }

    #[test]
    fn test_failed_setup_does_not_zero_later_statements() {
        let mut session = MemorySession::new()
            .with_plan_cost("SELECT cheap", 50.0)
            .with_plan_cost("SELECT expensive", 100.0);
        let reference = ["CREATE TABLE broken x y", "SELECT expensive"];

        assert_eq!(measure(&mut session, "db", &reference).unwrap(), 100.0);
        assert_eq!(cheaper(&["SELECT cheap"], &reference, "db", &mut session), Verdict::Fail);
    }

    #[test]
    fn test_failed_plan_contributes_zero() {
        let mut session = MemorySession::new().with_plan_cost("SELECT ok", 5.0);
        let total = measure(&mut session, "db", &["SELECT ok", "SELECT missing"]).unwrap();
        assert_eq!(total, 5.0);
    }

    #[test]
    fn test_begin_failure_fails_verdict() {
        let mut session = MemorySession::new()
            .with_error("BEGIN", "connection reset")
            .with_plan_cost("SELECT a", 10.0)
            .with_plan_cost("SELECT b", 1.0);
        assert_eq!(cheaper(&["SELECT a"], &["SELECT b"], "db", &mut session), Verdict::Fail);
    }
}
