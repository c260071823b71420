//! LLM client for OpenAI-compatible chat-completions APIs.
//!
//! Two calls: `generate_sql` returns the structured plan; `format_answer`
//! turns a query result into prose. The core places no trust in either
//! output beyond the plan's schema.

use std::time::Duration;

use chrono::{Datelike, Utc};
use reqwest::Client;

use super::models::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, LlmError, ResponseFormat,
};
use crate::config::LlmConfig;
use crate::models::{ChatTurn, QueryResult, SqlPlan};

const GENERATE_PROMPT: &str = include_str!("generate_prompt.md");

pub struct LlmClient {
    http_client: Client,
    api_base: String,
    api_key: String,
    model_name: String,
    max_tokens: u32,
    temperature: f64,
    timeout_seconds: u64,
    max_rows: i64,
}

impl LlmClient {
    pub fn new(config: &LlmConfig, max_rows: i64) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model_name: config.model_name.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout_seconds: config.timeout_seconds,
            max_rows,
        }
    }

    /// Generate a structured SQL plan for a question.
    pub async fn generate_sql(
        &self,
        question: &str,
        schema_context: &str,
        concepts_context: &str,
        history: &[ChatTurn],
    ) -> Result<SqlPlan, LlmError> {
        let system_prompt = self.build_system_prompt(schema_context, concepts_context);

        let mut messages = vec![ChatMessage { role: "system".to_string(), content: system_prompt }];
        for turn in history {
            messages.push(ChatMessage { role: turn.role.clone(), content: turn.content.clone() });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: format!("Question: {}\n\nGenerate SQL and respond with JSON only.", question),
        });

        let request = ChatCompletionRequest {
            model: self.model_name.clone(),
            messages,
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
            response_format: Some(ResponseFormat { r#type: "json_object".to_string() }),
        };

        let content = self.chat_completion(&request).await?;
        serde_json::from_str(&content).map_err(|e| {
            LlmError::Parse(format!("Failed to parse SQL plan: {}. Content: {}", e, content))
        })
    }

    /// Format the final answer from query results.
    pub async fn format_answer(
        &self,
        question: &str,
        sql: &str,
        result: &QueryResult,
        assumptions: &[String],
        concepts_used: &[String],
    ) -> Result<String, LlmError> {
        let preview_rows: Vec<&Vec<serde_json::Value>> = result.rows.iter().take(20).collect();
        let prompt = format!(
            "Given this question: {}\n\n\
             Executed SQL:\n{}\n\n\
             Result columns: {:?}\n\
             First rows: {}\n\
             Total rows: {}\n\
             Truncated: {}\n\n\
             Assumptions made: {:?}\n\
             Concepts used: {:?}\n\n\
             Provide a clear, concise answer in the user's language.\n\
             Include:\n\
             1. Direct answer with numbers\n\
             2. Timeframe and definitions used\n\
             3. Any important caveats\n\n\
             Keep it brief and professional.",
            question,
            sql,
            result.columns,
            serde_json::to_string(&preview_rows).unwrap_or_default(),
            result.row_count,
            result.truncated,
            assumptions,
            concepts_used,
        );

        let request = ChatCompletionRequest {
            model: self.model_name.clone(),
            messages: vec![ChatMessage { role: "user".to_string(), content: prompt }],
            max_tokens: Some(1024),
            temperature: Some(self.temperature),
            response_format: None,
        };

        self.chat_completion(&request).await
    }

    fn build_system_prompt(&self, schema_context: &str, concepts_context: &str) -> String {
        let now = Utc::now();
        GENERATE_PROMPT
            .replace("{schema_context}", schema_context)
            .replace("{concepts_context}", concepts_context)
            .replace("{max_rows}", &self.max_rows.to_string())
            .replace("{current_date}", &now.format("%Y-%m-%d").to_string())
            .replace("{current_year}", &now.year().to_string())
            .replace("{last_year}", &(now.year() - 1).to_string())
    }

    async fn chat_completion(&self, request: &ChatCompletionRequest) -> Result<String, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::NotConfigured);
        }

        let url = format!("{}/chat/completions", self.api_base);
        tracing::debug!("Calling LLM API: {} with model {}", url, self.model_name);

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(Duration::from_secs(self.timeout_seconds))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout_seconds)
                } else {
                    LlmError::Api(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let error_text =
                response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Api(format!("API error {}: {}", status, error_text)));
        }

        let chat_response: ChatCompletionResponse =
            response.json().await.map_err(|e| LlmError::Parse(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("Empty response from LLM".to_string()))
    }
}
