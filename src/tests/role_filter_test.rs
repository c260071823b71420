//! Role filter tests: redaction, idempotence, and super-user identity.

use serde_json::json;

use crate::models::{ChatResponse, PlanConfidence, QueryResult, SanityCheckResult, UserRole};
use crate::utils::redact_for_role;

fn full_response() -> ChatResponse {
    ChatResponse {
        session_id: "s-1".to_string(),
        answer: "There were 42 visits.".to_string(),
        sql: Some("SELECT COUNT(*) FROM ovst".to_string()),
        assumptions: vec!["calendar month".to_string()],
        concepts_used: vec!["opd_visit".to_string()],
        confidence: PlanConfidence::High,
        sanity_checks: vec![SanityCheckResult {
            check_name: "non_empty_check".to_string(),
            passed: true,
            message: "Query returned 1 rows".to_string(),
        }],
        query_result: Some(QueryResult {
            columns: vec!["count".to_string()],
            rows: vec![vec![json!(42)]],
            row_count: 1,
            truncated: false,
            execution_time_ms: 12,
        }),
        ..Default::default()
    }
}

#[test]
fn test_standard_user_loses_privileged_fields() {
    let mut response = full_response();
    redact_for_role(&mut response, UserRole::StandardUser);

    assert!(response.sql.is_none());
    assert!(response.query_result.is_none());
    assert!(response.sanity_checks.is_empty());
}

#[test]
fn test_standard_user_keeps_answer_and_metadata() {
    let mut response = full_response();
    redact_for_role(&mut response, UserRole::StandardUser);

    assert_eq!(response.answer, "There were 42 visits.");
    assert_eq!(response.assumptions, vec!["calendar month".to_string()]);
    assert_eq!(response.concepts_used, vec!["opd_visit".to_string()]);
    assert_eq!(response.confidence, PlanConfidence::High);
}

#[test]
fn test_redaction_is_idempotent() {
    let mut once = full_response();
    redact_for_role(&mut once, UserRole::StandardUser);

    let mut twice = full_response();
    redact_for_role(&mut twice, UserRole::StandardUser);
    redact_for_role(&mut twice, UserRole::StandardUser);

    assert_eq!(
        serde_json::to_value(&once).unwrap(),
        serde_json::to_value(&twice).unwrap()
    );
}

#[test]
fn test_super_user_identity() {
    let original = serde_json::to_value(full_response()).unwrap();

    let mut response = full_response();
    redact_for_role(&mut response, UserRole::SuperUser);

    assert_eq!(serde_json::to_value(&response).unwrap(), original);
}
