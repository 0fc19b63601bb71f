//! Cost Comparison Tests
//!
//! - Each measurement runs in a transaction that is always rolled back
//! - Reference must be strictly cheaper to pass
//! - Statement failures contribute zero and never abort the comparison
//! - Statements after a failure are still measured

use sqlgrade::cost::{cheaper, measure, TransactionGuard};
use sqlgrade::session::{MemorySession, Session};
use sqlgrade::verdict::Verdict;

// =============================================================================
// Helper Functions
// =============================================================================

fn priced(costs: &[(&str, f64)]) -> MemorySession {
    costs
        .iter()
        .fold(MemorySession::new(), |session, (sql, cost)| {
            session.with_plan_cost(sql, *cost)
        })
}

// =============================================================================
// Rollback Guarantee Tests
// =============================================================================

/// Setup that succeeded before a failure is not visible afterwards.
#[test]
fn test_failure_mid_list_leaves_no_trace() {
    let mut session = priced(&[("SELECT v FROM scratch", 4.0)]).with_table("items", &[1, 2]);
    let candidate = [
        "CREATE TABLE scratch",
        "INSERT INTO scratch VALUES (1)",
        "ALTER nonsense",
        "SELECT v FROM scratch",
    ];

    // The select after the failures still counts
    assert_eq!(measure(&mut session, "shop", &candidate).unwrap(), 4.0);

    // Inspect in a fresh transaction
    session.execute("BEGIN").unwrap();
    assert!(session.execute("SELECT v FROM scratch").is_err());
    session.execute("ROLLBACK").unwrap();
    assert_eq!(session.execute("SELECT v FROM items").unwrap().len(), 2);
    assert!(!session.in_transaction());
}

/// The candidate's setup is invisible while the reference is measured.
#[test]
fn test_lists_do_not_see_each_other() {
    let mut session = priced(&[("SELECT v FROM scratch", 1.0), ("SELECT slow", 50.0)]);
    let candidate = ["CREATE TABLE scratch", "SELECT slow"];
    let reference = ["CREATE TABLE scratch", "SELECT v FROM scratch"];

    // A leaked table would make the second CREATE fail and zero the reference
    assert_eq!(measure(&mut session, "shop", &candidate).unwrap(), 50.0);
    assert_eq!(measure(&mut session, "shop", &reference).unwrap(), 1.0);

    assert_eq!(cheaper(&candidate, &reference, "shop", &mut session), Verdict::Pass);
    assert!(!session.has_table("scratch"));
    assert_eq!(
        session
            .executed()
            .iter()
            .filter(|sql| sql.as_str() == "ROLLBACK")
            .count(),
        4
    );
}

/// The guard rolls back when the caller panics mid-measurement.
#[test]
fn test_guard_rolls_back_on_panic() {
    let mut session = MemorySession::new().with_table("items", &[]);

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mut tx = TransactionGuard::begin(&mut session, "shop").unwrap();
        tx.session().execute("CREATE TABLE scratch").unwrap();
        panic!("measurement interrupted");
    }));

    assert!(result.is_err());
    assert!(!session.has_table("scratch"));
    assert!(!session.in_transaction());
}

// =============================================================================
// Cost Ordering Tests
// =============================================================================

/// Pass only when the reference is strictly cheaper.
#[test]
fn test_strict_ordering() {
    let cases = [(100.0, 10.0, Verdict::Pass), (10.0, 10.0, Verdict::Fail), (10.0, 100.0, Verdict::Fail)];

    for (candidate_cost, reference_cost, expected) in cases {
        let mut session = priced(&[("SELECT candidate", candidate_cost), ("SELECT reference", reference_cost)]);
        assert_eq!(
            cheaper(&["SELECT candidate"], &["SELECT reference"], "shop", &mut session),
            expected,
            "candidate {} vs reference {}",
            candidate_cost,
            reference_cost
        );
    }
}

/// Costs sum over every data-manipulation statement of a list.
#[test]
fn test_costs_sum_across_list() {
    let mut session = priced(&[
        ("UPDATE items SET v = 1", 20.0),
        ("DELETE FROM items", 15.0),
        ("SELECT v FROM items", 30.0),
    ]);

    assert_eq!(
        measure(&mut session, "shop", &["UPDATE items SET v = 1", "DELETE FROM items"]).unwrap(),
        35.0
    );
    assert_eq!(
        cheaper(
            &["UPDATE items SET v = 1", "DELETE FROM items"],
            &["SELECT v FROM items"],
            "shop",
            &mut session
        ),
        Verdict::Pass
    );
}

/// A broken setup statement does not hide the cost of the statements after it.
#[test]
fn test_broken_setup_keeps_later_costs() {
    let mut session = priced(&[("SELECT cheap", 50.0), ("SELECT expensive", 100.0)]);
    let reference = ["CREATE TABLE broken x y", "SELECT expensive"];

    assert_eq!(measure(&mut session, "shop", &reference).unwrap(), 100.0);
    assert_eq!(
        cheaper(&["SELECT cheap"], &reference, "shop", &mut session),
        Verdict::Fail
    );
    assert!(!session.in_transaction());
}

/// A list whose every statement fails measures zero and cannot win.
#[test]
fn test_all_failures_measure_zero() {
    let mut session = priced(&[("SELECT reference", 5.0)]);

    assert_eq!(measure(&mut session, "shop", &["SELECT broken"]).unwrap(), 0.0);
    assert_eq!(
        cheaper(&["SELECT broken"], &["SELECT reference"], "shop", &mut session),
        Verdict::Fail
    );
}

/// Empty lists fail without running anything.
#[test]
fn test_empty_input_rejected() {
    let mut session = priced(&[("SELECT 1", 1.0)]);

    assert_eq!(cheaper(&[] as &[&str], &["SELECT 1"], "shop", &mut session), Verdict::Fail);
    assert!(session.executed().is_empty());
}
