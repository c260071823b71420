//! Guarded executor: runs validated SELECTs on the HIS warehouse under
//! hard per-query limits.
//!
//! Every call acquires a pooled connection, applies the per-statement
//! timeout on that connection, streams at most `max_rows + 1` rows, and
//! projects values positionally by column ordinal so downstream consumers
//! never depend on key iteration order. Execution errors propagate to the
//! orchestrator; execution is never retried.

use std::time::Instant;

use futures::TryStreamExt;
use sqlx::postgres::{PgColumn, PgPool, PgPoolOptions, PgRow};
use sqlx::types::BigDecimal;
use sqlx::{Column, Executor, Row, TypeInfo};

use crate::config::{DatabaseConfig, LimitsConfig};
use crate::models::QueryResult;
use crate::utils::ApiError;

pub struct GuardedExecutor {
    pool: PgPool,
    statement_timeout_ms: i64,
    max_rows: i64,
}

/// Double literal `%` so drivers that accept parameterized SQL never
/// reinterpret `LIKE '%foo%'` as a format placeholder. Applied only when
/// the SQL is submitted without bind parameters.
pub fn escape_literal_percents(sql: &str) -> String {
    sql.replace('%', "%%")
}

/// Enforce the row cap on a fetched batch: if more than `max_rows` rows
/// arrived, keep the first `max_rows` and flag truncation.
pub fn apply_row_cap<T>(mut rows: Vec<T>, max_rows: usize) -> (Vec<T>, bool) {
    let truncated = rows.len() > max_rows;
    if truncated {
        rows.truncate(max_rows);
    }
    (rows, truncated)
}

impl GuardedExecutor {
    pub async fn connect(
        database: &DatabaseConfig,
        limits: &LimitsConfig,
    ) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .min_connections(database.pool_min.clamp(1, 10))
            .max_connections(database.pool_max.clamp(1, 10))
            .connect(&database.url)
            .await?;

        Ok(Self {
            pool,
            statement_timeout_ms: limits.statement_timeout_ms,
            max_rows: limits.max_rows,
        })
    }

    /// Execute a validated read-only query with timeout and row cap.
    pub async fn execute_query(&self, sql: &str) -> Result<QueryResult, ApiError> {
        let start = Instant::now();

        let mut conn = self.pool.acquire().await.map_err(|e| {
            tracing::error!("Failed to get connection from pool: {}", e);
            ApiError::database_unavailable(format!("Failed to get connection: {}", e))
        })?;

        let set_timeout = format!("SET statement_timeout = {}", self.statement_timeout_ms);
        (&mut *conn).execute(set_timeout.as_str()).await.map_err(|e| {
            tracing::error!("Failed to set statement timeout: {}", e);
            ApiError::database_unavailable(format!("Failed to set statement timeout: {}", e))
        })?;

        // No bind parameters accompany guarded SQL, so literal percents are
        // doubled before submission
        let submitted = escape_literal_percents(sql);

        let max_rows = self.max_rows.max(0) as usize;
        let mut rows: Vec<PgRow> = Vec::new();
        {
            // Prepared statements are not reused across requests
            let mut stream = sqlx::query(&submitted).persistent(false).fetch(&mut *conn);
            // Fetch max_rows + 1 to detect truncation
            while let Some(row) = stream
                .try_next()
                .await
                .map_err(|e| self.map_execute_error(e))?
            {
                rows.push(row);
                if rows.len() > max_rows {
                    break;
                }
            }
        }

        let (rows, truncated) = apply_row_cap(rows, max_rows);

        let columns: Vec<String> = if let Some(first) = rows.first() {
            first.columns().iter().map(|c| c.name().to_string()).collect()
        } else {
            // Empty result: recover the declared column order from the
            // statement description
            (&mut *conn)
                .describe(&submitted)
                .await
                .map(|d| d.columns().iter().map(|c| c.name().to_string()).collect())
                .unwrap_or_default()
        };

        let data_rows: Vec<Vec<serde_json::Value>> = rows
            .iter()
            .map(|row| (0..row.columns().len()).map(|i| decode_value(row, i)).collect())
            .collect();

        let execution_time_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            "Query returned {} rows in {}ms (truncated={})",
            data_rows.len(),
            execution_time_ms,
            truncated
        );

        Ok(QueryResult {
            columns,
            row_count: data_rows.len(),
            rows: data_rows,
            truncated,
            execution_time_ms,
        })
    }

    pub async fn test_connection(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    fn map_execute_error(&self, e: sqlx::Error) -> ApiError {
        if let sqlx::Error::Database(db_err) = &e {
            // 57014 = query_canceled, raised when statement_timeout fires
            if db_err.code().as_deref() == Some("57014") {
                tracing::warn!("Query timed out after {}ms", self.statement_timeout_ms);
                return ApiError::query_failed(format!(
                    "Query timed out after {}ms",
                    self.statement_timeout_ms
                ));
            }
        }
        tracing::error!("Query execution failed: {}", e);
        ApiError::query_failed(format!("SQL execution failed: {}", e))
    }
}

/// Decode one value by column ordinal into JSON, by declared type.
fn decode_value(row: &PgRow, idx: usize) -> serde_json::Value {
    use serde_json::Value;

    let column: &PgColumn = &row.columns()[idx];
    let type_name = column.type_info().name();

    match type_name {
        "BOOL" => opt(row.try_get::<Option<bool>, _>(idx).ok().flatten().map(Value::Bool)),
        "INT2" => opt(row
            .try_get::<Option<i16>, _>(idx)
            .ok()
            .flatten()
            .map(|v| Value::Number(v.into()))),
        "INT4" => opt(row
            .try_get::<Option<i32>, _>(idx)
            .ok()
            .flatten()
            .map(|v| Value::Number(v.into()))),
        "INT8" => opt(row
            .try_get::<Option<i64>, _>(idx)
            .ok()
            .flatten()
            .map(|v| Value::Number(v.into()))),
        "FLOAT4" => opt(row
            .try_get::<Option<f32>, _>(idx)
            .ok()
            .flatten()
            .and_then(|v| serde_json::Number::from_f64(v as f64))
            .map(Value::Number)),
        "FLOAT8" => opt(row
            .try_get::<Option<f64>, _>(idx)
            .ok()
            .flatten()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)),
        "NUMERIC" => opt(row
            .try_get::<Option<BigDecimal>, _>(idx)
            .ok()
            .flatten()
            .and_then(|v| v.to_string().parse::<f64>().ok())
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)),
        "DATE" => opt(row
            .try_get::<Option<chrono::NaiveDate>, _>(idx)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))),
        "TIME" => opt(row
            .try_get::<Option<chrono::NaiveTime>, _>(idx)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))),
        "TIMESTAMP" => opt(row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))),
        "TIMESTAMPTZ" => opt(row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_rfc3339()))),
        "VARCHAR" | "TEXT" | "CHAR" | "BPCHAR" | "NAME" => {
            opt(row.try_get::<Option<String>, _>(idx).ok().flatten().map(Value::String))
        },
        _ => opt(row
            .try_get_unchecked::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(Value::String)),
    }
}

fn opt(value: Option<serde_json::Value>) -> serde_json::Value {
    value.unwrap_or(serde_json::Value::Null)
}
