//! SQL guard: static safety validation for LLM-generated SQL.
//!
//! Layered pipeline, short-circuiting on the first failure:
//! 1. Keyword blocklist on literal-scrubbed text
//! 2. Parse as a single statement (PostgreSQL dialect)
//! 3. Statement type: plain SELECT, set operations of SELECTs, or a
//!    WITH-wrapped form of those
//! 4. Reference extraction with alias and scope resolution
//! 5. No `SELECT *` (qualified or not)
//! 6. No PHI column exposed in the result set (aggregates don't expose)
//! 7. Catalog existence for every referenced table and column (strict mode)
//! 8. Aggregation classification
//! 9. LIMIT required and bounded for non-aggregate queries
//! 10. Join-quality warnings (never fatal)

mod extract;
mod keywords;

pub use extract::{ExtractedJoin, SqlRefs, STAR_KEY, UNKNOWN_KEY};
pub use keywords::{find_forbidden_keyword, FORBIDDEN_KEYWORDS};

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::services::catalog::{Confidence, SchemaCatalog, PHI_COLUMNS};

/// Validation failure raised by the guard.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GuardError {
    #[error("Forbidden keyword: {0}")]
    ForbiddenKeyword(String),

    #[error("Only SELECT statements are allowed. Got: {0}")]
    ForbiddenStatement(String),

    #[error("SQL parse error: {0}")]
    Parse(String),

    #[error("{0}")]
    SelectStar(String),

    #[error("PHI column(s) cannot be included in SELECT output: {0}")]
    PhiExposure(String),

    #[error("Unknown table(s): {0}")]
    UnknownTable(String),

    #[error("Unknown column(s): {0}")]
    UnknownColumn(String),

    #[error("{0}")]
    MissingLimit(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GuardErrorKind {
    ForbiddenKeywordError,
    ForbiddenStatementError,
    SQLParseError,
    SelectStarError,
    PHIExposureError,
    UnknownTableError,
    UnknownColumnError,
    MissingLimitError,
}

impl GuardErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ForbiddenKeywordError => "ForbiddenKeywordError",
            Self::ForbiddenStatementError => "ForbiddenStatementError",
            Self::SQLParseError => "SQLParseError",
            Self::SelectStarError => "SelectStarError",
            Self::PHIExposureError => "PHIExposureError",
            Self::UnknownTableError => "UnknownTableError",
            Self::UnknownColumnError => "UnknownColumnError",
            Self::MissingLimitError => "MissingLimitError",
        }
    }
}

impl GuardError {
    pub fn kind(&self) -> GuardErrorKind {
        match self {
            Self::ForbiddenKeyword(_) => GuardErrorKind::ForbiddenKeywordError,
            Self::ForbiddenStatement(_) => GuardErrorKind::ForbiddenStatementError,
            Self::Parse(_) => GuardErrorKind::SQLParseError,
            Self::SelectStar(_) => GuardErrorKind::SelectStarError,
            Self::PhiExposure(_) => GuardErrorKind::PHIExposureError,
            Self::UnknownTable(_) => GuardErrorKind::UnknownTableError,
            Self::UnknownColumn(_) => GuardErrorKind::UnknownColumnError,
            Self::MissingLimit(_) => GuardErrorKind::MissingLimitError,
        }
    }
}

/// Warning about a potentially problematic join. Never causes rejection.
#[derive(Debug, Clone, Serialize)]
pub struct JoinWarning {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
    pub confidence: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_alternative: Option<String>,
}

/// Outcome of one guard run. One per call; never shared.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<GuardErrorKind>,
    pub tables_used: Vec<String>,
    pub columns_used: BTreeMap<String, Vec<String>>,
    pub all_columns: BTreeMap<String, Vec<String>>,
    pub has_aggregation: bool,
    pub has_limit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_value: Option<u64>,
    pub phi_columns_found: Vec<String>,
    pub warnings: Vec<String>,
    pub join_warnings: Vec<JoinWarning>,
}

impl ValidationResult {
    fn failure(error: GuardError) -> Self {
        Self {
            valid: false,
            error_type: Some(error.kind()),
            error: Some(error.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct GuardOptions {
    /// Ceiling for LIMIT on non-aggregate queries
    pub max_rows: i64,
    /// Reject unknown tables/columns instead of warning
    pub strict_catalog: bool,
    /// Consult the join validator for every extracted equality join
    pub validate_joins: bool,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self { max_rows: 2000, strict_catalog: false, validate_joins: true }
    }
}

/// Validate SQL against all safety rules.
pub fn validate_sql(
    sql: &str,
    catalog: Option<&SchemaCatalog>,
    options: &GuardOptions,
) -> ValidationResult {
    // Layer 1: keyword blocklist
    if let Some(keyword) = find_forbidden_keyword(sql) {
        tracing::warn!("Guard rejected SQL: forbidden keyword {}", keyword);
        return ValidationResult::failure(GuardError::ForbiddenKeyword(keyword.to_string()));
    }

    // Layer 2: parse as a single statement
    let statements = match Parser::parse_sql(&PostgreSqlDialect {}, sql) {
        Ok(statements) => statements,
        Err(e) => {
            tracing::warn!("Guard rejected SQL: parse error: {}", e);
            return ValidationResult::failure(GuardError::Parse(e.to_string()));
        },
    };

    if statements.is_empty() {
        return ValidationResult::failure(GuardError::Parse("empty statement".to_string()));
    }
    if statements.len() > 1 {
        tracing::warn!("Guard rejected SQL: {} statements in one input", statements.len());
        return ValidationResult::failure(GuardError::ForbiddenStatement(
            "multiple statements".to_string(),
        ));
    }
    let statement = &statements[0];

    // Layer 3: statement type
    let query = match permitted_query(statement) {
        Ok(query) => query,
        Err(error) => {
            tracing::warn!("Guard rejected SQL: {}", error);
            return ValidationResult::failure(error);
        },
    };

    // Layer 4: reference extraction
    let refs = extract::extract_refs(statement, query);
    let has_agg = extract::has_aggregation(statement, query);
    let limit_value = extract::find_limit(query);
    let mut warnings: Vec<String> = Vec::new();

    // Layer 5: no SELECT *
    if let Some(error) = check_select_star(&refs.exposed) {
        tracing::warn!("Guard rejected SQL: {}", error);
        let mut result = ValidationResult::failure(error);
        result.tables_used = refs.tables;
        return result;
    }

    // Layer 6: PHI exposure
    let phi_found = phi_in_exposed(&refs.exposed, catalog);
    if !phi_found.is_empty() {
        let error = GuardError::PhiExposure(phi_found.join(", "));
        tracing::warn!("Guard rejected SQL: {}", error);
        let mut result = ValidationResult::failure(error);
        result.tables_used = refs.tables;
        result.phi_columns_found = phi_found;
        return result;
    }

    // Layer 7: catalog existence
    if let Some(catalog) = catalog {
        let columns_for_validation: BTreeMap<String, Vec<String>> = refs
            .all_columns
            .iter()
            .filter(|(table, _)| {
                table.as_str() != UNKNOWN_KEY
                    && table.as_str() != STAR_KEY
                    && !refs.cte_names.contains(*table)
            })
            .map(|(table, cols)| (table.clone(), cols.clone()))
            .collect();

        let (invalid_tables, invalid_columns) =
            catalog.validate_sql_references(&refs.tables, &columns_for_validation);

        if options.strict_catalog {
            if !invalid_tables.is_empty() {
                let error = GuardError::UnknownTable(invalid_tables.join(", "));
                tracing::warn!("Guard rejected SQL: {}", error);
                let mut result = ValidationResult::failure(error);
                result.tables_used = refs.tables;
                result.all_columns = refs.all_columns;
                return result;
            }
            if !invalid_columns.is_empty() {
                let error = GuardError::UnknownColumn(invalid_columns.join(", "));
                tracing::warn!("Guard rejected SQL: {}", error);
                let mut result = ValidationResult::failure(error);
                result.tables_used = refs.tables;
                result.all_columns = refs.all_columns;
                return result;
            }
        } else {
            for table in &invalid_tables {
                warnings.push(format!("Table '{}' not found in catalog", table));
            }
            for column in &invalid_columns {
                warnings.push(format!("Column '{}' not found in catalog", column));
            }
        }
    }

    // Layer 9: LIMIT rule for non-aggregate queries
    if !has_agg {
        match limit_value {
            None => {
                let error = GuardError::MissingLimit(format!(
                    "Non-aggregate queries must include LIMIT (max {} rows)",
                    options.max_rows
                ));
                tracing::warn!("Guard rejected SQL: {}", error);
                let mut result = ValidationResult::failure(error);
                result.tables_used = refs.tables;
                result.columns_used = refs.exposed;
                result.all_columns = refs.all_columns;
                result.warnings = warnings;
                return result;
            },
            Some(value) if value as i64 > options.max_rows => {
                let error = GuardError::MissingLimit(format!(
                    "LIMIT {} exceeds maximum allowed ({})",
                    value, options.max_rows
                ));
                tracing::warn!("Guard rejected SQL: {}", error);
                let mut result = ValidationResult::failure(error);
                result.tables_used = refs.tables;
                result.columns_used = refs.exposed;
                result.all_columns = refs.all_columns;
                result.has_limit = true;
                result.limit_value = Some(value);
                result.warnings = warnings;
                return result;
            },
            Some(_) => {},
        }
    }

    // Layer 10: join-quality warnings (non-fatal)
    let mut join_warnings: Vec<JoinWarning> = Vec::new();
    if let Some(catalog) = catalog {
        if options.validate_joins {
            let extracted = extract::extract_equi_joins(query, &refs.aliases);
            if !extracted.is_empty() {
                join_warnings = validate_extracted_joins(&extracted, catalog);
                append_join_warning_texts(&join_warnings, &mut warnings);
            }
        }
    }

    ValidationResult {
        valid: true,
        error: None,
        error_type: None,
        tables_used: refs.tables,
        columns_used: refs.exposed,
        all_columns: refs.all_columns,
        has_aggregation: has_agg,
        has_limit: limit_value.is_some(),
        limit_value,
        phi_columns_found: Vec::new(),
        warnings,
        join_warnings,
    }
}

/// Accept only queries whose body is SELECT all the way down.
fn permitted_query(statement: &Statement) -> Result<&Query, GuardError> {
    match statement {
        Statement::Query(query) => {
            if set_expr_is_select(&query.body) {
                Ok(query)
            } else {
                Err(GuardError::ForbiddenStatement(statement_kind(statement)))
            }
        },
        _ => Err(GuardError::ForbiddenStatement(statement_kind(statement))),
    }
}

fn set_expr_is_select(set_expr: &SetExpr) -> bool {
    match set_expr {
        SetExpr::Select(_) => true,
        SetExpr::Query(query) => set_expr_is_select(&query.body),
        SetExpr::SetOperation { left, right, .. } => {
            set_expr_is_select(left) && set_expr_is_select(right)
        },
        _ => false,
    }
}

fn statement_kind(statement: &Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .next()
        .unwrap_or("unknown")
        .to_uppercase()
}

fn check_select_star(exposed: &BTreeMap<String, Vec<String>>) -> Option<GuardError> {
    for (table, cols) in exposed {
        if cols.iter().any(|c| c == "*") {
            let message = if table == STAR_KEY {
                "SELECT * is not allowed. Please specify explicit column names.".to_string()
            } else {
                format!("SELECT {}.* is not allowed. Please specify explicit column names.", table)
            };
            return Some(GuardError::SelectStar(message));
        }
    }
    None
}

/// PHI columns in the exposed map: the fixed name set always applies; the
/// catalog's load-time PHI marking applies to columns under known tables.
fn phi_in_exposed(
    exposed: &BTreeMap<String, Vec<String>>,
    catalog: Option<&SchemaCatalog>,
) -> Vec<String> {
    let mut found = Vec::new();

    for (table, cols) in exposed {
        for col in cols {
            let col_lower = col.to_lowercase();

            if PHI_COLUMNS.contains(col_lower.as_str()) {
                if table == UNKNOWN_KEY {
                    found.push(col_lower);
                } else {
                    found.push(format!("{}.{}", table, col_lower));
                }
                continue;
            }

            if table != UNKNOWN_KEY && table != STAR_KEY {
                if let Some(catalog) = catalog {
                    if let Some(column) = catalog.get_column(table, &col_lower) {
                        if column.is_phi {
                            found.push(format!("{}.{}", table, col_lower));
                        }
                    }
                }
            }
        }
    }

    found
}

fn validate_extracted_joins(
    joins: &[ExtractedJoin],
    catalog: &SchemaCatalog,
) -> Vec<JoinWarning> {
    let mut warnings = Vec::new();

    for join in joins {
        let validation = catalog.validate_join(
            &join.left_table,
            &join.left_column,
            &join.right_table,
            &join.right_column,
        );

        if validation.valid && validation.confidence == Confidence::Heuristic {
            // Suggest a verified alternative when one clearly beats a
            // heuristic guess
            let suggested = catalog
                .best_join(&join.left_table, &join.right_table)
                .filter(|path| path.total_score > 25)
                .and_then(|path| {
                    path.steps.first().map(|step| {
                        format!(
                            "{}.{} = {}.{}",
                            step.from_table, step.from_column, step.to_table, step.to_column
                        )
                    })
                });

            warnings.push(JoinWarning {
                from_table: join.left_table.clone(),
                from_column: join.left_column.clone(),
                to_table: join.right_table.clone(),
                to_column: join.right_column.clone(),
                confidence: "heuristic".to_string(),
                message: "Low confidence join - consider using a verified join path".to_string(),
                suggested_alternative: suggested,
            });
        }

        for message in &validation.warnings {
            warnings.push(JoinWarning {
                from_table: join.left_table.clone(),
                from_column: join.left_column.clone(),
                to_table: join.right_table.clone(),
                to_column: join.right_column.clone(),
                confidence: validation.confidence.as_str().to_string(),
                message: message.clone(),
                suggested_alternative: None,
            });
        }

        if !validation.valid {
            warnings.push(JoinWarning {
                from_table: join.left_table.clone(),
                from_column: join.left_column.clone(),
                to_table: join.right_table.clone(),
                to_column: join.right_column.clone(),
                confidence: "unknown".to_string(),
                message: "Join not found in schema catalog".to_string(),
                suggested_alternative: None,
            });
        }
    }

    warnings
}

/// Project structured join warnings into readable strings, coalescing
/// duplicates.
fn append_join_warning_texts(join_warnings: &[JoinWarning], warnings: &mut Vec<String>) {
    let mut seen: HashSet<String> = HashSet::new();

    for jw in join_warnings {
        let message = if jw.confidence == "heuristic" && jw.message.starts_with("Low confidence") {
            let mut msg = format!(
                "Low-confidence join: {}.{} = {}.{}",
                jw.from_table, jw.from_column, jw.to_table, jw.to_column
            );
            if let Some(alt) = &jw.suggested_alternative {
                msg.push_str(&format!(" (consider: {})", alt));
            }
            msg
        } else if jw.confidence == "unknown" {
            format!(
                "Unverified join: {}.{} = {}.{}",
                jw.from_table, jw.from_column, jw.to_table, jw.to_column
            )
        } else if !jw.message.is_empty() {
            format!("Join warning ({}.{}): {}", jw.from_table, jw.from_column, jw.message)
        } else {
            continue;
        };

        if seen.insert(message.clone()) {
            warnings.push(message);
        }
    }
}
