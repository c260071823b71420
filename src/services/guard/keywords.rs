//! Keyword pre-filter: reject obviously dangerous input before the parser
//! runs, including stacked statements whose continuation a single-statement
//! AST cannot model.

use once_cell::sync::Lazy;
use regex::Regex;

/// Statements and commands that must never reach the database.
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "GRANT", "REVOKE",
    "COPY", "VACUUM", "ANALYZE", "CALL", "DO", "MERGE", "EXECUTE", "PREPARE", "DEALLOCATE",
    "COMMIT", "ROLLBACK", "SAVEPOINT", "LOCK", "UNLOCK", "SET ROLE", "RESET", "DISCARD", "LOAD",
    "UNLOAD",
];

static KEYWORD_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    FORBIDDEN_KEYWORDS
        .iter()
        .map(|kw| {
            let pattern = format!(r"\b{}\b", kw);
            (*kw, Regex::new(&pattern).expect("keyword pattern"))
        })
        .collect()
});

static SINGLE_QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"'[^']*'").expect("literal regex"));
static DOUBLE_QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#""[^"]*""#).expect("literal regex"));

/// Search for a forbidden keyword outside string literals.
///
/// Literals are scrubbed first so `WHERE note LIKE '%DELETE%'` does not trip
/// a false positive. Escaped quotes inside literals are deliberately not
/// modeled; adversarial cases fail at the parse or statement-type layer.
pub fn find_forbidden_keyword(sql: &str) -> Option<&'static str> {
    let upper = sql.to_uppercase();
    let cleaned = SINGLE_QUOTED.replace_all(&upper, "''");
    let cleaned = DOUBLE_QUOTED.replace_all(&cleaned, "\"\"");

    KEYWORD_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(&cleaned))
        .map(|(kw, _)| *kw)
}
