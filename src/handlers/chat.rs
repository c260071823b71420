//! Chat endpoint: orchestrate the question pipeline and shape the response
//! for the caller's role.

use std::sync::Arc;

use axum::{extract::State, Extension, Json};

use crate::middleware::AuthUser;
use crate::models::{ChatRequest, ChatResponse, MAX_MESSAGE_LEN};
use crate::utils::{redact_for_role, ApiError, ApiResult};
use crate::AppState;

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::validation_error("Message cannot be empty"));
    }
    if message.chars().count() > MAX_MESSAGE_LEN {
        return Err(ApiError::validation_error(format!(
            "Message exceeds {} characters",
            MAX_MESSAGE_LEN
        )));
    }

    let mut response = state.orchestrator.handle_message(&request, user.role).await;

    // Strip privileged fields for standard users; applied after execution
    // and formatting, never opportunistically
    redact_for_role(&mut response, user.role);

    Ok(Json(response))
}
