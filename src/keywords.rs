//! Required keyword/function usage check
//!
//! Pure text containment: a keyword counts as used if it appears anywhere in
//! the lower-cased statements, including inside literals and comments.

use crate::verdict::Verdict;

/// Passes when every entry of `required` occurs, case-insensitively, in the
/// space-joined `statements`. An empty statement list fails.
pub fn uses_required<S, K>(statements: &[S], required: &[K]) -> Verdict
where
    S: AsRef<str>,
    K: AsRef<str>,
{
    if statements.is_empty() {
        return Verdict::Fail;
    }

    let combined = statements
        .iter()
        .map(|sql| sql.as_ref().to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    required
        .iter()
        .all(|kw| combined.contains(&kw.as_ref().to_lowercase()))
        .into()
}
