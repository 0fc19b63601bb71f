//! sqlgrade - Execution-based SQL answer grading
//!
//! Decides whether a candidate SQL answer is correct by running it against a
//! live database and comparing its results with a reference solution, and
//! whether a candidate is cheaper than a reference by the planner's cost
//! estimate.
//!
//! - `sanitize`, `normalize`: statement and result preparation
//! - `session`, `backend`: statement execution
//! - `equivalence`, `keywords`, `cost`: the comparators
//! - `eval`: dataset grading and reports

pub mod backend;
pub mod cli;
pub mod cost;
pub mod equivalence;
pub mod eval;
pub mod keywords;
pub mod normalize;
pub mod observability;
pub mod sanitize;
pub mod session;
pub mod value;
pub mod verdict;
