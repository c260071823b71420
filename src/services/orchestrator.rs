//! Chat orchestrator: the per-request state machine.
//!
//! generate → validate (strict) → retry once on failure → execute →
//! sanity-check → format → respond. The retry exists to give the LLM a
//! correction signal; it happens at most once per request and does not
//! carry over to later exchanges in the same session.

use std::sync::Arc;

use crate::config::LimitsConfig;
use crate::models::{
    ChatRequest, ChatResponse, ChatTurn, MessageRole, PlanConfidence, SqlPlan, UserRole,
};
use crate::services::catalog::{CatalogService, SchemaCatalog};
use crate::services::concepts::ConceptLibrary;
use crate::services::executor::GuardedExecutor;
use crate::services::guard::{validate_sql, GuardOptions};
use crate::services::llm::{build_concepts_context, build_schema_context, LlmClient, LlmError};
use crate::services::sanity::run_sanity_checks;
use crate::services::session_store::SessionStore;

/// Tables rendered into the schema prompt context.
const SCHEMA_CONTEXT_MAX_TABLES: usize = 50;

pub struct ChatOrchestrator {
    catalog: Arc<CatalogService>,
    llm: Arc<LlmClient>,
    executor: Arc<GuardedExecutor>,
    sessions: Arc<SessionStore>,
    concepts: Arc<ConceptLibrary>,
    limits: LimitsConfig,
}

impl ChatOrchestrator {
    pub fn new(
        catalog: Arc<CatalogService>,
        llm: Arc<LlmClient>,
        executor: Arc<GuardedExecutor>,
        sessions: Arc<SessionStore>,
        concepts: Arc<ConceptLibrary>,
        limits: LimitsConfig,
    ) -> Self {
        Self { catalog, llm, executor, sessions, concepts, limits }
    }

    /// Handle one user message and produce the response.
    ///
    /// The assistant message recorded in the session carries the SQL only
    /// for super users; standard users' history stays SQL-free.
    pub async fn handle_message(&self, request: &ChatRequest, role: UserRole) -> ChatResponse {
        let session_id = self.sessions.get_or_create(request.session_id.as_deref());
        self.sessions.append(&session_id, MessageRole::User, &request.message, None);

        let response = self.process_question(&request.message, &session_id).await;

        let recorded_sql = if role.is_super() { response.sql.clone() } else { None };
        self.sessions.append(&session_id, MessageRole::Assistant, &response.answer, recorded_sql);

        response
    }

    async fn process_question(&self, question: &str, session_id: &str) -> ChatResponse {
        let history = self.sessions.history(session_id, self.limits.history_window);
        let catalog = self.catalog.get();
        let schema_context = build_schema_context(&catalog, SCHEMA_CONTEXT_MAX_TABLES);
        let concepts_context = build_concepts_context(&self.concepts);

        // Step 1: generate
        let mut plan = match self
            .llm
            .generate_sql(question, &schema_context, &concepts_context, &history)
            .await
        {
            Ok(plan) => plan,
            Err(LlmError::Parse(e)) => {
                // Malformed plan: ask the user instead of guessing
                tracing::warn!("LLM returned a malformed plan: {}", e);
                return ChatResponse {
                    session_id: session_id.to_string(),
                    answer: "I had trouble understanding the request. Could you rephrase it?"
                        .to_string(),
                    needs_clarification: true,
                    confidence: PlanConfidence::Low,
                    ..Default::default()
                };
            },
            Err(e) => {
                tracing::error!("LLM generation failed: {}", e);
                return ChatResponse::error(
                    session_id,
                    "I encountered an error processing your question. Please try again.",
                    e.to_string(),
                );
            },
        };

        // Step 2: clarification short-circuit
        if plan.needs_clarification {
            return ChatResponse {
                session_id: session_id.to_string(),
                answer: plan
                    .clarification_question
                    .clone()
                    .unwrap_or_else(|| "Could you please clarify your question?".to_string()),
                needs_clarification: true,
                clarification_question: plan.clarification_question,
                assumptions: plan.assumptions,
                confidence: plan.confidence,
                ..Default::default()
            };
        }

        let mut sql = plan.sql.clone();
        if sql.trim().is_empty() {
            return ChatResponse {
                session_id: session_id.to_string(),
                answer: "I couldn't generate a SQL query for your question. Could you rephrase it?"
                    .to_string(),
                error: Some("No SQL generated".to_string()),
                confidence: PlanConfidence::Low,
                ..Default::default()
            };
        }

        // Step 3: validate with the guard, strict against the catalog
        let guard_options = GuardOptions {
            max_rows: self.limits.max_rows,
            strict_catalog: true,
            validate_joins: true,
        };
        let mut validation = validate_sql(&sql, Some(&catalog), &guard_options);

        // Step 4: at most one retry with the failure as context
        if !validation.valid {
            let error = validation.error.clone().unwrap_or_else(|| "Unknown error".to_string());
            tracing::warn!("SQL validation failed: {}", error);

            let retry_plan =
                self.retry_with_error(question, &sql, &error, &history, &catalog).await;

            match retry_plan {
                Some(retry) if !retry.sql.trim().is_empty() => {
                    let retry_validation =
                        validate_sql(&retry.sql, Some(&catalog), &guard_options);
                    if retry_validation.valid {
                        sql = retry.sql.clone();
                        plan = retry;
                        validation = retry_validation;
                    } else {
                        return self.validation_failure_response(session_id, &sql, &error, &plan);
                    }
                },
                _ => {
                    return self.validation_failure_response(session_id, &sql, &error, &plan);
                },
            }
        }

        // Step 5: execute under timeout and row cap
        let result = match self.executor.execute_query(&sql).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Database execution error: {}", e);
                return ChatResponse {
                    session_id: session_id.to_string(),
                    answer: format!("I couldn't execute the query. Error: {}", e),
                    sql: Some(sql),
                    error: Some(e.to_string()),
                    assumptions: plan.assumptions,
                    concepts_used: plan.concepts_used,
                    confidence: PlanConfidence::Low,
                    ..Default::default()
                };
            },
        };

        // Step 6: sanity checks annotate, never suppress
        let sanity_results = run_sanity_checks(&result);
        let failed_checks: Vec<_> = sanity_results.iter().filter(|c| !c.passed).collect();
        if !failed_checks.is_empty() {
            tracing::warn!(
                "Sanity checks failed: {:?}",
                failed_checks.iter().map(|c| &c.message).collect::<Vec<_>>()
            );
        }

        // Step 7: format the answer
        let mut answer = match self
            .llm
            .format_answer(question, &sql, &result, &plan.assumptions, &plan.concepts_used)
            .await
        {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!("Answer formatting failed: {}", e);
                return ChatResponse {
                    session_id: session_id.to_string(),
                    answer: "I ran the query but couldn't format the answer. Please try again."
                        .to_string(),
                    sql: Some(sql),
                    error: Some(e.to_string()),
                    query_result: Some(result),
                    sanity_checks: sanity_results,
                    confidence: PlanConfidence::Low,
                    ..Default::default()
                };
            },
        };

        if !failed_checks.is_empty() {
            answer.push_str("\n\nNote: some data validation checks raised concerns:\n");
            for check in &failed_checks {
                answer.push_str(&format!("- {}\n", check.message));
            }
        }
        if result.truncated {
            answer.push_str(&format!("\n\nNote: results were limited to {} rows.", result.row_count));
        }

        ChatResponse {
            session_id: session_id.to_string(),
            answer,
            sql: Some(sql),
            assumptions: plan.assumptions,
            concepts_used: plan.concepts_used,
            confidence: plan.confidence,
            sanity_checks: sanity_results,
            query_result: Some(result),
            warnings: validation.warnings.clone(),
            join_warnings: validation.join_warnings.clone(),
            ..Default::default()
        }
    }

    fn validation_failure_response(
        &self,
        session_id: &str,
        sql: &str,
        error: &str,
        plan: &SqlPlan,
    ) -> ChatResponse {
        ChatResponse {
            session_id: session_id.to_string(),
            answer: format!("I couldn't generate a safe SQL query. Error: {}", error),
            sql: Some(sql.to_string()),
            error: Some(error.to_string()),
            assumptions: plan.assumptions.clone(),
            confidence: PlanConfidence::Low,
            ..Default::default()
        }
    }

    /// Re-ask the LLM once, with the failed SQL, the guard's reason, and
    /// the relevant schema slice as extra context.
    async fn retry_with_error(
        &self,
        question: &str,
        failed_sql: &str,
        error: &str,
        history: &[ChatTurn],
        catalog: &SchemaCatalog,
    ) -> Option<SqlPlan> {
        let mut available_tables = String::new();

        let table_list: Vec<&String> = catalog.tables.keys().collect();
        if !table_list.is_empty() {
            available_tables = format!(
                "\n\nAvailable tables: {}",
                table_list.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
            );
        }

        if error.contains("Unknown table") {
            available_tables.push_str("\n\nPlease use ONLY these exact table names.");
        }

        if error.contains("Unknown column") {
            let failed_lower = failed_sql.to_lowercase();
            for table_name in catalog.tables.keys() {
                if failed_lower.contains(&table_name.to_lowercase()) {
                    let cols = catalog.column_names(table_name);
                    if !cols.is_empty() {
                        available_tables.push_str(&format!(
                            "\n\nVerified columns in {}: {}",
                            table_name,
                            cols.join(", ")
                        ));
                    }
                }
            }
        }

        let mut error_context = history.to_vec();
        error_context.push(ChatTurn::new(
            "assistant",
            format!(
                "I generated this SQL but it failed validation:\n```sql\n{}\n```\nError: {}{}",
                failed_sql, error, available_tables
            ),
        ));
        error_context.push(ChatTurn::new(
            "user",
            format!(
                "Please fix the SQL using ONLY the tables and columns listed above. \
                 Remember: no PHI columns in SELECT, no SELECT *, and non-aggregate queries \
                 need LIMIT. Original question: {}",
                question
            ),
        ));

        let schema_context = build_schema_context(catalog, SCHEMA_CONTEXT_MAX_TABLES);
        let concepts_context = build_concepts_context(&self.concepts);

        match self
            .llm
            .generate_sql(question, &schema_context, &concepts_context, &error_context)
            .await
        {
            Ok(plan) => Some(plan),
            Err(e) => {
                tracing::error!("Retry generation failed: {}", e);
                None
            },
        }
    }
}
