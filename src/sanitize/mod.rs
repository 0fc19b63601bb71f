//! Statement sanitizer
//!
//! Strips comments and normalizing modifiers from SQL text before execution.
//!
//! Both passes are textual. Modifier stripping works on whitespace tokens,
//! so a `distinct` token inside a string literal or used as an alias is
//! removed as well; comment markers inside string literals are treated as
//! comments. No input is rejected: every statement comes back best-effort.

use std::sync::OnceLock;

use regex::Regex;

/// Modifier removed by [`sanitize`]
pub const DISTINCT: &str = "distinct";

fn block_comment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid block comment pattern"))
}

fn line_comment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Stops before the line break so it can be put back
    RE.get_or_init(|| Regex::new(r"--[^\r\n]*").expect("valid line comment pattern"))
}

fn blank_lines() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n+").expect("valid blank line pattern"))
}

/// Removes block and line comments from each statement.
///
/// Runs of blank lines collapse into one line break and the result is
/// trimmed.
pub fn strip_comments<S: AsRef<str>>(statements: &[S]) -> Vec<String> {
    statements
        .iter()
        .map(|sql| strip_comments_one(sql.as_ref()))
        .collect()
}

fn strip_comments_one(sql: &str) -> String {
    let no_block = block_comment().replace_all(sql, "");
    let no_line = line_comment().replace_all(&no_block, "");
    let no_blank = blank_lines().replace_all(&no_line, "\n");
    no_blank.trim().to_string()
}

/// Removes every whitespace token equal (case-insensitively) to `keyword`,
/// rejoining the remaining tokens with single spaces.
pub fn strip_modifier<S: AsRef<str>>(statements: &[S], keyword: &str) -> Vec<String> {
    statements
        .iter()
        .map(|sql| {
            sql.as_ref()
                .split_whitespace()
                .filter(|token| !token.eq_ignore_ascii_case(keyword))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

/// Removes standalone `DISTINCT` tokens
pub fn strip_distinct<S: AsRef<str>>(statements: &[S]) -> Vec<String> {
    strip_modifier(statements, DISTINCT)
}

/// Full sanitizing pass: comments first, then `DISTINCT`.
///
/// Order matters: token rejoining flattens line breaks, which would turn a
/// line comment into a comment over the rest of the statement.
pub fn sanitize<S: AsRef<str>>(statements: &[S]) -> Vec<String> {
    strip_distinct(&strip_comments(statements))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_comment_removed_across_lines() {
        let out = strip_comments(&["SELECT a /* one\ntwo */ FROM t"]);
        assert_eq!(out, vec!["SELECT a  FROM t"]);
    }

    #[test]
    fn test_block_comments_non_greedy() {
        let out = strip_comments(&["SELECT /* a */ x /* b */ FROM t"]);
        assert_eq!(out, vec!["SELECT  x  FROM t"]);
    }

    #[test]
    fn test_line_comment_keeps_newline() {
        let out = strip_comments(&["SELECT a -- first\nFROM t -- second\r\nWHERE b"]);
        assert_eq!(out, vec!["SELECT a \nFROM t \r\nWHERE b"]);
    }

    #[test]
    fn test_line_comment_at_end_of_input() {
        let out = strip_comments(&["SELECT 1 -- trailing"]);
        assert_eq!(out, vec!["SELECT 1"]);
    }

    #[test]
    fn test_blank_lines_collapse() {
        let out = strip_comments(&["\n\nSELECT 1\n\n   \n\nFROM t\n\n"]);
        assert_eq!(out, vec!["SELECT 1\nFROM t"]);
    }

    #[test]
    fn test_comment_only_statement_becomes_empty() {
        let out = strip_comments(&["-- nothing here\n/* or here */"]);
        assert_eq!(out, vec![""]);
    }

    #[test]
    fn test_strip_distinct_any_case() {
        let out = strip_distinct(&["select DISTINCT a,   Distinct b from t"]);
        assert_eq!(out, vec!["select a, b from t"]);
    }

    #[test]
    fn test_strip_distinct_keeps_attached_tokens() {
        // Not a standalone token
        let out = strip_distinct(&["SELECT COUNT(DISTINCT a) FROM t"]);
        assert_eq!(out, vec!["SELECT COUNT(DISTINCT a) FROM t"]);
    }

    #[test]
    fn test_strip_distinct_hits_literals() {
        let out = strip_distinct(&["SELECT 'a distinct b' FROM t"]);
        assert_eq!(out, vec!["SELECT 'a b' FROM t"]);
    }

    #[test]
    fn test_sanitize_full() {
        let out = sanitize(&["SELECT DISTINCT a /* c */ FROM t -- trailing\n"]);
        assert_eq!(out, vec!["SELECT a FROM t"]);
    }

    #[test]
    fn test_sanitize_preserves_list_shape() {
        let input = vec!["CREATE TABLE x (a int)".to_string(), String::new()];
        let out = sanitize(&input);
        assert_eq!(out, vec!["CREATE TABLE x (a int)".to_string(), String::new()]);
    }
}
