//! Request/response types for the chat pipeline.

use serde::{Deserialize, Serialize};

use crate::services::guard::JoinWarning;

/// Maximum accepted question length, in characters.
pub const MAX_MESSAGE_LEN: usize = 4000;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Confidence reported by the LLM for a generated plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanConfidence {
    High,
    #[default]
    Medium,
    Low,
}

/// Structured plan returned by the LLM for a single question.
///
/// Every field is defaulted: the LLM is an untrusted producer and a missing
/// field must never panic the pipeline. A payload that fails to deserialize
/// at all is treated upstream as clarification-needed.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SqlPlan {
    #[serde(default)]
    pub needs_clarification: bool,
    #[serde(default)]
    pub clarification_question: Option<String>,
    #[serde(default)]
    pub clarified_question: String,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub concepts_used: Vec<String>,
    #[serde(default)]
    pub sql: String,
    #[serde(default)]
    pub validation_checks: Vec<String>,
    #[serde(default)]
    pub answer_plan: String,
    #[serde(default)]
    pub confidence: PlanConfidence,
}

/// Result of executing a guarded query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
    pub truncated: bool,
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanityCheckResult {
    pub check_name: String,
    pub passed: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ChatResponse {
    pub session_id: String,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assumptions: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub concepts_used: Vec<String>,
    pub confidence: PlanConfidence,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sanity_checks: Vec<SanityCheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_result: Option<QueryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub needs_clarification: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarification_question: Option<String>,
    /// Non-fatal observations from the guard (join quality, unknown joins).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub join_warnings: Vec<JoinWarning>,
}

impl ChatResponse {
    pub fn error(session_id: impl Into<String>, answer: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            answer: answer.into(),
            error: Some(error.into()),
            confidence: PlanConfidence::Low,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}
