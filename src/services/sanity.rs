//! Post-execution sanity checks on result tables.
//!
//! Failures annotate the response; they never suppress it.

use serde_json::Value;

use crate::models::{QueryResult, SanityCheckResult};

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// The result must contain at least one row.
pub fn check_non_empty(result: &QueryResult) -> SanityCheckResult {
    if result.row_count == 0 {
        return SanityCheckResult {
            check_name: "non_empty_check".to_string(),
            passed: false,
            message: "Query returned no results".to_string(),
        };
    }

    SanityCheckResult {
        check_name: "non_empty_check".to_string(),
        passed: true,
        message: format!("Query returned {} rows", result.row_count),
    }
}

/// Values in a column named `count` (exact, case-insensitive) must be
/// positive.
pub fn check_denominator(result: &QueryResult) -> SanityCheckResult {
    let name = "denominator_check";

    let Some(col_idx) = result.columns.iter().position(|c| c.eq_ignore_ascii_case("count"))
    else {
        return SanityCheckResult {
            check_name: name.to_string(),
            passed: true,
            message: "Column 'count' not found, skipping check".to_string(),
        };
    };

    for row in &result.rows {
        if let Some(value) = row.get(col_idx).and_then(numeric) {
            if value <= 0.0 {
                return SanityCheckResult {
                    check_name: name.to_string(),
                    passed: false,
                    message: format!("Found non-positive value ({}) in count", value),
                };
            }
        }
    }

    SanityCheckResult {
        check_name: name.to_string(),
        passed: true,
        message: "All denominator values are positive".to_string(),
    }
}

/// Values in any column whose name contains `percent` (case-insensitive)
/// must lie in [0, 100].
pub fn check_percent_range(result: &QueryResult) -> SanityCheckResult {
    let name = "percent_range_check";
    let (min_val, max_val) = (0.0, 100.0);

    let Some(col_idx) =
        result.columns.iter().position(|c| c.to_lowercase().contains("percent"))
    else {
        return SanityCheckResult {
            check_name: name.to_string(),
            passed: true,
            message: "No percentage column found, skipping check".to_string(),
        };
    };

    for row in &result.rows {
        if let Some(value) = row.get(col_idx).and_then(numeric) {
            if value < min_val || value > max_val {
                return SanityCheckResult {
                    check_name: name.to_string(),
                    passed: false,
                    message: format!(
                        "Percentage value ({}) outside range [{}, {}]",
                        value, min_val, max_val
                    ),
                };
            }
        }
    }

    SanityCheckResult {
        check_name: name.to_string(),
        passed: true,
        message: format!("All percentage values within [{}, {}]", min_val, max_val),
    }
}

/// Run all applicable sanity checks on a query result.
pub fn run_sanity_checks(result: &QueryResult) -> Vec<SanityCheckResult> {
    vec![check_non_empty(result), check_denominator(result), check_percent_range(result)]
}
