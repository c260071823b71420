use std::sync::Arc;

use axum::{extract::State, Json};

use crate::models::HealthResponse;
use crate::AppState;

/// Health check (no auth required).
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let db_ok = state.executor.test_connection().await;
    Json(HealthResponse {
        status: if db_ok { "healthy" } else { "degraded" },
        database: if db_ok { "connected" } else { "disconnected" },
    })
}
