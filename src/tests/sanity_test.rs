//! Sanity check tests.

use serde_json::json;

use crate::models::QueryResult;
use crate::services::sanity::{
    check_denominator, check_non_empty, check_percent_range, run_sanity_checks,
};

fn result(columns: &[&str], rows: Vec<Vec<serde_json::Value>>) -> QueryResult {
    QueryResult {
        columns: columns.iter().map(|c| c.to_string()).collect(),
        row_count: rows.len(),
        rows,
        truncated: false,
        execution_time_ms: 1,
    }
}

#[test]
fn test_non_empty_passes() {
    let r = result(&["count"], vec![vec![json!(5)]]);
    let check = check_non_empty(&r);
    assert!(check.passed);
    assert!(check.message.contains("1 rows"));
}

#[test]
fn test_non_empty_fails_on_zero_rows() {
    let r = result(&["count"], vec![]);
    let check = check_non_empty(&r);
    assert!(!check.passed);
}

#[test]
fn test_denominator_passes_on_positive_counts() {
    let r = result(&["cliniclct", "count"], vec![
        vec![json!("01"), json!(10)],
        vec![json!("02"), json!(3)],
    ]);
    assert!(check_denominator(&r).passed);
}

#[test]
fn test_denominator_fails_on_zero() {
    let r = result(&["count"], vec![vec![json!(0)]]);
    let check = check_denominator(&r);
    assert!(!check.passed);
    assert!(check.message.contains("non-positive"));
}

#[test]
fn test_denominator_fails_on_negative() {
    let r = result(&["COUNT"], vec![vec![json!(-2)]]);
    assert!(!check_denominator(&r).passed);
}

#[test]
fn test_denominator_requires_exact_name() {
    // "patient_count" is not an exact match; check is skipped
    let r = result(&["patient_count"], vec![vec![json!(-5)]]);
    let check = check_denominator(&r);
    assert!(check.passed);
    assert!(check.message.contains("skipping"));
}

#[test]
fn test_denominator_ignores_nulls() {
    let r = result(&["count"], vec![vec![json!(null)], vec![json!(4)]]);
    assert!(check_denominator(&r).passed);
}

#[test]
fn test_percent_passes_in_range() {
    let r = result(&["percent"], vec![vec![json!(0)], vec![json!(55.5)], vec![json!(100)]]);
    assert!(check_percent_range(&r).passed);
}

#[test]
fn test_percent_fails_out_of_range() {
    let r = result(&["percent"], vec![vec![json!(101.5)]]);
    let check = check_percent_range(&r);
    assert!(!check.passed);
    assert!(check.message.contains("101.5"));
}

#[test]
fn test_percent_matches_substring() {
    // Substring match: "pct_percent_total" style names are covered
    let r = result(&["visit_percentage"], vec![vec![json!(-1)]]);
    assert!(!check_percent_range(&r).passed);
}

#[test]
fn test_percent_skipped_without_matching_column() {
    let r = result(&["ratio"], vec![vec![json!(500)]]);
    assert!(check_percent_range(&r).passed);
}

#[test]
fn test_numeric_strings_are_checked() {
    let r = result(&["count"], vec![vec![json!("0")]]);
    assert!(!check_denominator(&r).passed);
}

#[test]
fn test_run_sanity_checks_reports_all_three() {
    let r = result(&["count", "percent"], vec![vec![json!(5), json!(40)]]);
    let checks = run_sanity_checks(&r);
    assert_eq!(checks.len(), 3);
    assert!(checks.iter().all(|c| c.passed));

    let names: Vec<&str> = checks.iter().map(|c| c.check_name.as_str()).collect();
    assert_eq!(names, vec!["non_empty_check", "denominator_check", "percent_range_check"]);
}

#[test]
fn test_failures_annotate_not_suppress() {
    let r = result(&["count"], vec![]);
    let checks = run_sanity_checks(&r);
    // All checks still run and report; nothing panics or short-circuits
    assert_eq!(checks.len(), 3);
    assert!(!checks[0].passed);
}
