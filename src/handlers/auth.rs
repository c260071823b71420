//! Authentication endpoints: login with per-IP rate limiting, logout, and
//! the current-user echo.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;

use crate::middleware::AuthUser;
use crate::models::{LoginRequest, LoginResponse, UserInfo};
use crate::utils::{ApiError, ApiResult};
use crate::AppState;

/// Client IP for rate limiting: X-Forwarded-For wins behind a proxy.
fn client_ip(headers: &HeaderMap, addr: &SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| addr.ip().to_string())
}

fn session_cookie(name: &str, value: &str, max_age: i64) -> String {
    format!("{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax", name, value, max_age)
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let ip = client_ip(&headers, &addr);
    let limiter = &state.login_limiter;

    if limiter.is_blocked(&ip) {
        let remaining = limiter.remaining_seconds(&ip);
        tracing::warn!("Rate limited login attempt from {}", ip);
        return Err(ApiError::too_many_requests(format!(
            "Too many failed attempts. Please try again in {} seconds.",
            remaining
        )));
    }

    let Some(user) = state.user_store.verify(&request.email, &request.password) else {
        limiter.record_failure(&ip);
        tracing::info!("Failed login attempt for {} from {}", request.email, ip);
        return Err(ApiError::unauthorized("Invalid email or password"));
    };

    limiter.record_success(&ip);
    tracing::info!("Successful login: {} (role={})", user.email, user.role.as_str());

    let token = state.jwt_util.create_token(&user)?;
    let cookie =
        session_cookie(&state.session_cookie_name, &token, state.jwt_util.max_age_secs());

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse::from(user)),
    ))
}

pub async fn logout(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cookie = session_cookie(&state.session_cookie_name, "", 0);
    (StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(json!({ "message": "Logged out" })))
}

pub async fn me(Extension(user): Extension<AuthUser>) -> Json<UserInfo> {
    Json(user.user_info())
}
