//! Declarative test cases
//!
//! A test case names one comparator and its parameters:
//!
//! ```json
//! {"kind": "result_match", "decimal_places": 2}
//! {"kind": "uses_keywords", "keywords": ["jsonb_agg"]}
//! {"kind": "cheaper_than"}
//! ```
//!
//! Entries that are not a known check (for example free-form test code) are
//! kept verbatim and always fail.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::dataset::StatementField;
use crate::cost::cheaper;
use crate::equivalence::default_check;
use crate::keywords::uses_required;
use crate::observability::Logger;
use crate::session::Session;
use crate::verdict::Verdict;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Check {
    /// Sanitized predicted and reference results must match
    ResultMatch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        decimal_places: Option<u32>,
    },
    /// The predicted statements must mention every keyword
    UsesKeywords { keywords: Vec<String> },
    /// The predicted statements must be cheaper than the baseline
    /// (the instance's issue statements unless given)
    CheaperThan {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        baseline: Option<StatementField>,
    },
}

impl Check {
    pub fn name(&self) -> &'static str {
        match self {
            Check::ResultMatch { .. } => "result_match",
            Check::UsesKeywords { .. } => "uses_keywords",
            Check::CheaperThan { .. } => "cheaper_than",
        }
    }

    /// Runs the check on `session`, which already holds the effects of the
    /// predicted statements.
    pub fn run<S: Session + ?Sized>(&self, context: &CheckContext<'_>, session: &mut S) -> Verdict {
        match self {
            Check::ResultMatch { decimal_places } => default_check(
                context.predicted,
                context.reference,
                context.database,
                session,
                *decimal_places,
            ),
            Check::UsesKeywords { keywords } => uses_required(context.predicted, keywords),
            Check::CheaperThan { baseline } => {
                let baseline = match baseline {
                    Some(field) => field.statements(),
                    None => context.issue.to_vec(),
                };
                cheaper(&baseline, context.predicted, context.database, session)
            }
        }
    }
}

impl Default for Check {
    fn default() -> Self {
        Check::ResultMatch {
            decimal_places: None,
        }
    }
}

/// A dataset test case: a known check or an entry kept as written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TestCase {
    Check(Check),
    Unsupported(Json),
}

impl TestCase {
    pub fn run<S: Session + ?Sized>(&self, context: &CheckContext<'_>, session: &mut S) -> Verdict {
        match self {
            TestCase::Check(check) => check.run(context, session),
            TestCase::Unsupported(_) => {
                Logger::warn(
                    "TEST_CASE_UNSUPPORTED",
                    &[("database", context.database)],
                );
                Verdict::Fail
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TestCase::Check(check) => check.name(),
            TestCase::Unsupported(_) => "unsupported",
        }
    }
}

/// Statement lists a check may consult
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    pub database: &'a str,
    pub predicted: &'a [String],
    pub reference: &'a [String],
    pub issue: &'a [String],
}
