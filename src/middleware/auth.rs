use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::models::{UserInfo, UserRole};
use crate::utils::{ApiError, JwtUtil};

#[derive(Clone)]
pub struct AuthState {
    pub jwt_util: Arc<JwtUtil>,
    pub cookie_name: String,
}

/// Authenticated caller, inserted into request extensions for handlers.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub email: String,
    pub name: String,
    pub department: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn user_info(&self) -> UserInfo {
        UserInfo {
            email: self.email.clone(),
            name: self.name.clone(),
            department: self.department.clone(),
            role: self.role,
        }
    }
}

/// Authentication middleware.
/// 1. Extract the session token from the cookie (or a Bearer header)
/// 2. Verify the signature and expiry
/// 3. Insert `AuthUser` into request extensions
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let uri = req.uri().path().to_string();
    let method = req.method().to_string();

    let token = token_from_cookie(&req, &state.cookie_name)
        .or_else(|| token_from_bearer(&req))
        .ok_or_else(|| {
            tracing::debug!("Missing session token for {} {}", method, uri);
            ApiError::unauthorized("Not authenticated")
        })?;

    let claims = state.jwt_util.verify_token(&token).map_err(|err| {
        tracing::warn!("Session token verification failed for {} {}", method, uri);
        err
    })?;

    tracing::debug!("Authenticated {} ({}) on {} {}", claims.sub, claims.role.as_str(), method, uri);

    let user = AuthUser {
        email: claims.sub,
        name: claims.name,
        department: claims.department,
        role: claims.role,
    };
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

fn token_from_cookie(req: &Request, cookie_name: &str) -> Option<String> {
    let cookies = req.headers().get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == cookie_name).then(|| value.to_string())
    })
}

fn token_from_bearer(req: &Request) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}
