//! Per-instance grading
//!
//! # Grading one instance
//!
//! 1. Instances missing required fields fail as execution errors
//! 2. `preprocess_sql` runs; its failures are logged only
//! 3. `pred_sqls` runs; an error or timeout fails the instance and skips
//!    the test cases
//! 4. Each test case runs in order on the same session; any failure is an
//!    assertion error
//! 5. `clean_up_sql` runs on a fresh session, then the database is restored
//!
//! [`grade_instance`] grades on the instance's own database;
//! [`grade_on_copy`] grades on a copy of it and restores the copy.

use serde::Serialize;

use super::checks::{CheckContext, TestCase};
use super::dataset::{Instance, InstanceId};
use crate::observability::{Logger, ObservationScope};
use crate::session::{execute_statements, Connector};

/// Final status of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Success,
    Failed,
}

/// Grading outcome of one instance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceResult {
    pub instance_id: InstanceId,
    pub status: InstanceStatus,
    pub error_message: Option<String>,
    pub total_test_cases: usize,
    pub passed_test_cases: usize,
    pub failed_test_cases: Vec<String>,
    pub execution_error: bool,
    pub timeout_error: bool,
    pub assertion_error: bool,
}

impl InstanceResult {
    fn new(instance_id: InstanceId, total_test_cases: usize) -> Self {
        Self {
            instance_id,
            status: InstanceStatus::Success,
            error_message: None,
            total_test_cases,
            passed_test_cases: 0,
            failed_test_cases: Vec::new(),
            execution_error: false,
            timeout_error: false,
            assertion_error: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == InstanceStatus::Success
    }

    /// `" | Eval Phase: ..."` notes for each flag set
    pub fn phase_notes(&self) -> String {
        let mut notes = String::new();
        if self.execution_error {
            notes.push_str(" | Eval Phase: Execution Error");
        }
        if self.timeout_error {
            notes.push_str(" | Eval Phase: Timeout Error");
        }
        if self.assertion_error {
            notes.push_str(" | Eval Phase: Assertion Error");
        }
        notes
    }

    /// A failed result for an instance that could not be graded at all
    pub(super) fn not_graded(instance: &Instance, message: String) -> Self {
        let total = instance.declared_test_cases().len().max(1);
        let mut result = Self::new(instance.instance_id.clone(), total);
        result.execution_error = true;
        result.error_message = Some(message);
        result.finish()
    }

    fn finish(mut self) -> Self {
        if self.execution_error || self.timeout_error || self.assertion_error {
            self.status = InstanceStatus::Failed;
            if self.error_message.is_none() {
                self.error_message = Some(if self.failed_test_cases.is_empty() {
                    self.phase_notes().trim_start_matches(" | ").to_string()
                } else {
                    format!("{} failed", self.failed_test_cases.join(", "))
                });
            }
        }
        self
    }
}

/// Grades `instance` on its own database
pub fn grade_instance<C: Connector + ?Sized>(
    connector: &mut C,
    instance: &Instance,
    run_id: &str,
) -> InstanceResult {
    grade(connector, instance, None, run_id)
}

/// Grades `instance` on `copy`, a copy of its database
pub fn grade_on_copy<C: Connector + ?Sized>(
    connector: &mut C,
    instance: &Instance,
    copy: &str,
    run_id: &str,
) -> InstanceResult {
    grade(connector, instance, Some(copy), run_id)
}

fn grade<C: Connector + ?Sized>(
    connector: &mut C,
    instance: &Instance,
    copy: Option<&str>,
    run_id: &str,
) -> InstanceResult {
    let id = instance.instance_id.to_string();
    let declared = instance.declared_test_cases();
    let default_cases = [TestCase::Check(Default::default())];
    let test_cases: &[TestCase] = if declared.is_empty() {
        &default_cases
    } else {
        declared
    };

    let mut result = InstanceResult::new(instance.instance_id.clone(), test_cases.len());

    let missing = instance.missing_fields();
    if !missing.is_empty() {
        let message = format!("Missing fields: {}", missing.join(", "));
        Logger::warn(
            "INSTANCE_INVALID",
            &[("instance_id", &id), ("reason", &message), ("run_id", run_id)],
        );
        result.execution_error = true;
        result.error_message = Some(message);
        return result.finish();
    }

    let base = instance.database();
    let database = copy.unwrap_or(base);
    let scope = ObservationScope::with_fields(
        "INSTANCE",
        &[("database", database), ("instance_id", &id), ("run_id", run_id)],
    );

    let mut session = match connector.connect(database) {
        Ok(session) => session,
        Err(e) => {
            scope.fail(&e.to_string());
            result.execution_error = true;
            result.error_message = Some(e.to_string());
            return result.finish();
        }
    };

    let preprocess = instance.preprocess();
    if !execute_statements(&mut session, database, &preprocess).is_usable() {
        Logger::warn(
            "PREPROCESS_FAILED",
            &[("instance_id", &id), ("run_id", run_id)],
        );
    }

    let predicted = instance.predicted();
    let outcome = execute_statements(&mut session, database, &predicted);
    result.execution_error = outcome.error_occurred;
    result.timeout_error = outcome.timed_out;

    if outcome.is_usable() {
        let reference = instance.solution();
        let issue = instance.issue();
        let context = CheckContext {
            database,
            predicted: &predicted,
            reference: &reference,
            issue: &issue,
        };

        for (i, case) in test_cases.iter().enumerate() {
            let verdict = case.run(&context, &mut session);
            let position = (i + 1).to_string();
            Logger::info(
                "TEST_CASE_RESULT",
                &[
                    ("check", case.name()),
                    ("instance_id", &id),
                    ("position", &position),
                    ("run_id", run_id),
                    ("verdict", &verdict.to_string()),
                ],
            );
            if verdict.is_pass() {
                result.passed_test_cases += 1;
            } else {
                result.failed_test_cases.push(format!("test_{}", position));
            }
        }
        result.assertion_error = !result.failed_test_cases.is_empty();
    }
    drop(session);

    clean_up(connector, instance, base, database, &id, run_id);

    let result = result.finish();
    if result.is_success() {
        scope.complete_with_fields(&[("status", "success")]);
    } else {
        let notes = result.phase_notes();
        scope.fail(notes.trim_start_matches(" | "));
    }
    result
}

fn clean_up<C: Connector + ?Sized>(
    connector: &mut C,
    instance: &Instance,
    base: &str,
    database: &str,
    id: &str,
    run_id: &str,
) {
    let clean_up = instance.clean_up();
    if !clean_up.is_empty() {
        match connector.connect(database) {
            Ok(mut session) => {
                execute_statements(&mut session, database, &clean_up);
            }
            Err(e) => Logger::warn(
                "CLEAN_UP_SKIPPED",
                &[("error", &e.to_string()), ("instance_id", id), ("run_id", run_id)],
            ),
        }
    }

    if let Err(e) = connector.restore(base, database) {
        Logger::error(
            "DATABASE_RESTORE_FAILED",
            &[
                ("database", database),
                ("error", &e.to_string()),
                ("instance_id", id),
                ("run_id", run_id),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MemoryConnector, MemorySession, Session};
    use crate::value::Value;
    use serde_json::json;

    fn instance(value: serde_json::Value) -> Instance {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_default_check_passes() {
        let session = MemorySession::new()
            .with_table("items", &[1, 2])
            .with_rows(
                "SELECT DISTINCT v FROM items",
                vec![vec![Value::Int(1)], vec![Value::Int(2)]],
            );
        let mut connector = MemoryConnector::new(session);
        let result = grade_instance(
            &mut connector,
            &instance(json!({
                "instance_id": 1,
                "selected_database": "shop",
                "preprocess_sql": [],
                "sol_sql": "SELECT v FROM items",
                "pred_sqls": ["SELECT DISTINCT v FROM items"]
            })),
            "run",
        );
        assert!(result.is_success());
        assert_eq!((result.passed_test_cases, result.total_test_cases), (1, 1));
        assert_eq!(result.error_message, None);
        assert_eq!(connector.restored(), vec!["shop".to_string()]);
    }

    #[test]
    fn test_missing_fields_fail_without_connecting() {
        let mut connector = MemoryConnector::default();
        let result = grade_instance(
            &mut connector,
            &instance(json!({"instance_id": "q1", "selected_database": "shop"})),
            "run",
        );
        assert_eq!(result.status, InstanceStatus::Failed);
        assert!(result.execution_error);
        assert_eq!(
            result.error_message.as_deref(),
            Some("Missing fields: preprocess_sql, sol_sql, pred_sqls")
        );
        assert!(connector.connected().is_empty());
    }

    #[test]
    fn test_prediction_error_skips_checks() {
        let mut connector = MemoryConnector::new(MemorySession::new());
        let result = grade_instance(
            &mut connector,
            &instance(json!({
                "instance_id": 2,
                "selected_database": "shop",
                "preprocess_sql": [],
                "sol_sql": ["SELECT 1"],
                "pred_sqls": ["SELEC broken"],
                "test_cases": [{"kind": "result_match"}, {"kind": "uses_keywords", "keywords": ["x"]}]
            })),
            "run",
        );
        assert!(result.execution_error);
        assert!(!result.assertion_error);
        assert_eq!(result.passed_test_cases, 0);
        assert_eq!(result.total_test_cases, 2);
        assert!(result.failed_test_cases.is_empty());
        assert_eq!(result.error_message.as_deref(), Some("Eval Phase: Execution Error"));
    }

    #[test]
    fn test_failed_checks_are_listed() {
        let mut connector = MemoryConnector::new(MemorySession::new().with_table("items", &[1]));
        let result = grade_instance(
            &mut connector,
            &instance(json!({
                "instance_id": 3,
                "selected_database": "shop",
                "preprocess_sql": "",
                "sol_sql": ["SELECT v FROM items"],
                "pred_sqls": ["SELECT v FROM items"],
                "test_cases": [
                    {"kind": "uses_keywords", "keywords": ["jsonb_agg"]},
                    {"kind": "result_match"},
                    "def test_case(): pass"
                ]
            })),
            "run",
        );
        assert!(result.assertion_error);
        assert_eq!(result.passed_test_cases, 1);
        assert_eq!(result.failed_test_cases, vec!["test_1".to_string(), "test_3".to_string()]);
        assert_eq!(result.error_message.as_deref(), Some("test_1, test_3 failed"));
        assert_eq!(
            result.phase_notes(),
            " | Eval Phase: Assertion Error"
        );
    }

    #[test]
    fn test_timeout_flag() {
        let session = MemorySession::new().with_timeout("SELECT pg_sleep(120)");
        let mut connector = MemoryConnector::new(session);
        let result = grade_instance(
            &mut connector,
            &instance(json!({
                "instance_id": 4,
                "selected_database": "shop",
                "preprocess_sql": [],
                "sol_sql": ["SELECT 1"],
                "pred_sqls": ["SELECT pg_sleep(120)"]
            })),
            "run",
        );
        assert!(result.timeout_error);
        assert!(!result.execution_error);
        assert_eq!(result.status, InstanceStatus::Failed);
    }

    #[test]
    fn test_unreachable_database() {
        let mut connector = MemoryConnector::default().with_unreachable("gone");
        let result = grade_instance(
            &mut connector,
            &instance(json!({
                "instance_id": 5,
                "selected_database": "gone",
                "preprocess_sql": [],
                "sol_sql": ["SELECT 1"],
                "pred_sqls": ["SELECT 1"]
            })),
            "run",
        );
        assert!(result.execution_error);
        assert!(result
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("does not exist"));
        assert!(connector.restored().is_empty());
    }

    #[test]
    fn test_clean_up_uses_fresh_session() {
        let mut connector = MemoryConnector::new(MemorySession::new().with_table("items", &[]));
        grade_instance(
            &mut connector,
            &instance(json!({
                "instance_id": 6,
                "selected_database": "shop",
                "preprocess_sql": ["CREATE TABLE scratch"],
                "sol_sql": ["SELECT v FROM scratch"],
                "pred_sqls": ["INSERT INTO scratch VALUES (1)", "SELECT v FROM scratch"],
                "clean_up_sql": ["DROP TABLE scratch"]
            })),
            "run",
        );
        assert_eq!(connector.connected(), vec!["shop".to_string(), "shop".to_string()]);
    }

    #[test]
    fn test_grade_on_copy() {
        let mut connector = MemoryConnector::new(MemorySession::new().with_table("items", &[1]));
        connector.create_copy("shop", "shop_process_1").unwrap();

        let result = grade_on_copy(
            &mut connector,
            &instance(json!({
                "instance_id": 7,
                "selected_database": "shop",
                "preprocess_sql": [],
                "sol_sql": ["SELECT v FROM items"],
                "pred_sqls": ["INSERT INTO items VALUES (2)", "SELECT v FROM items"]
            })),
            "shop_process_1",
            "run",
        );

        assert!(result.is_success());
        assert_eq!(connector.connected(), vec!["shop_process_1".to_string()]);
        assert_eq!(connector.restored(), vec!["shop_process_1".to_string()]);
        let mut copy = connector.connect("shop_process_1").unwrap();
        assert_eq!(copy.execute("SELECT v FROM items").unwrap().len(), 1);
    }

    #[test]
    fn test_not_graded_result() {
        let result = InstanceResult::not_graded(
            &instance(json!({"instance_id": 8, "selected_database": "shop"})),
            "No available copies of database \"shop\"".to_string(),
        );
        assert_eq!(result.status, InstanceStatus::Failed);
        assert!(result.execution_error);
        assert_eq!(result.total_test_cases, 1);
    }
}
