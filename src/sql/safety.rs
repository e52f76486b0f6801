//! SQL safety validator.
//!
//! Model output is adversarial-by-construction: it can hallucinate DDL or
//! smuggle a second statement behind a semicolon. This validator is the only
//! barrier before execution, so it whitelists (exactly one parseable SELECT)
//! instead of relying on keyword blacklists alone. The word-boundary keyword
//! scan from the reference checker is kept in front of the parser; it is
//! stricter than necessary (it also fires on mutating keywords inside string
//! literals) and that strictness is intentional.

use crate::error::{HoopError, Result};
use regex::Regex;
use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::sync::OnceLock;

static MUTATING_KEYWORDS: OnceLock<Regex> = OnceLock::new();
static LINE_COMMENTS: OnceLock<Regex> = OnceLock::new();

fn mutating_keywords() -> &'static Regex {
    MUTATING_KEYWORDS.get_or_init(|| {
        Regex::new(r"(?i)\b(insert|update|delete|drop|alter|create|replace|truncate)\b")
            .expect("keyword regex")
    })
}

fn line_comments() -> &'static Regex {
    LINE_COMMENTS.get_or_init(|| Regex::new(r"--[^\n]*").expect("comment regex"))
}

/// Validate a candidate query and return the parser's canonical
/// re-serialization. Downstream limit injection and cost checks operate on
/// the normalized text, never the original. Idempotent on normalized input.
pub fn validate(sql: &str) -> Result<String> {
    let stripped = line_comments().replace_all(sql, "");
    let trimmed = stripped.trim();

    if trimmed.is_empty() {
        return Err(HoopError::Syntax("empty query".to_string()));
    }

    if let Some(m) = mutating_keywords().find(trimmed) {
        return Err(HoopError::Unsafe(format!(
            "mutating keyword '{}' is not allowed",
            m.as_str().to_lowercase()
        )));
    }

    // A semicolon before the final trimmed terminator means a second
    // statement is being smuggled in.
    if trimmed.trim_end_matches(';').contains(';') {
        return Err(HoopError::Unsafe(
            "multiple SQL statements are not allowed".to_string(),
        ));
    }

    let dialect = PostgreSqlDialect {};
    let statements = Parser::parse_sql(&dialect, trimmed)
        .map_err(|e| HoopError::Syntax(e.to_string()))?;

    if statements.len() != 1 {
        return Err(HoopError::Unsafe(
            "multiple SQL statements are not allowed".to_string(),
        ));
    }

    match &statements[0] {
        Statement::Query(_) => Ok(statements[0].to_string()),
        other => Err(HoopError::Unsafe(format!(
            "only SELECT statements are allowed, got: {}",
            statement_kind(other)
        ))),
    }
}

fn statement_kind(statement: &Statement) -> &'static str {
    match statement {
        Statement::Insert { .. } => "INSERT",
        Statement::Update { .. } => "UPDATE",
        Statement::Delete { .. } => "DELETE",
        Statement::Drop { .. } => "DROP",
        Statement::CreateTable { .. } | Statement::CreateView { .. } => "CREATE",
        Statement::AlterTable { .. } => "ALTER",
        Statement::Truncate { .. } => "TRUNCATE",
        _ => "non-SELECT statement",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_select() {
        let normalized = validate("SELECT player_name FROM players").unwrap();
        assert!(normalized.to_lowercase().starts_with("select"));
    }

    #[test]
    fn rejects_mutating_keyword_after_select() {
        let err = validate("SELECT 1; DROP TABLE players").unwrap_err();
        assert!(matches!(err, HoopError::Unsafe(_)));
    }

    #[test]
    fn rejects_bare_ddl() {
        assert!(matches!(
            validate("DROP TABLE players"),
            Err(HoopError::Unsafe(_))
        ));
        assert!(matches!(
            validate("TRUNCATE players"),
            Err(HoopError::Unsafe(_))
        ));
    }

    #[test]
    fn rejects_update_appended_to_union() {
        let err = validate("SELECT * FROM players UNION SELECT * FROM players; UPDATE players SET pts = 0").unwrap_err();
        assert!(matches!(err, HoopError::Unsafe(_)));
    }

    #[test]
    fn rejects_multiple_statements() {
        let err = validate("SELECT 1; SELECT 2").unwrap_err();
        assert!(matches!(err, HoopError::Unsafe(_)));
    }

    #[test]
    fn trailing_semicolon_is_fine() {
        assert!(validate("SELECT 1;").is_ok());
    }

    #[test]
    fn rejects_unparseable_sql() {
        let err = validate("SELECT FROM WHERE").unwrap_err();
        assert!(matches!(err, HoopError::Syntax(_)));
    }

    #[test]
    fn strips_line_comments_before_checking() {
        assert!(validate("SELECT pts -- points column\nFROM players").is_ok());
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = validate("select   player_name\nfrom players where pts > 20").unwrap();
        let twice = validate(&once).unwrap();
        assert_eq!(once, twice);
    }
}
