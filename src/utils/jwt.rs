//! Session token signing and verification.
//!
//! Tokens are HS256 JWTs carried in an HttpOnly cookie. The claims mirror
//! the authenticated user record so the middleware never has to hit the
//! user store on every request.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::models::{UserInfo, UserRole};
use crate::utils::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User email
    pub sub: String,
    pub name: String,
    pub department: String,
    pub role: UserRole,
    pub exp: i64,
}

pub struct JwtUtil {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    max_age_secs: i64,
}

impl JwtUtil {
    pub fn new(secret: &str, max_age_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            max_age_secs,
        }
    }

    pub fn create_token(&self, user: &UserInfo) -> Result<String, ApiError> {
        let claims = Claims {
            sub: user.email.clone(),
            name: user.name.clone(),
            department: user.department.clone(),
            role: user.role,
            exp: Utc::now().timestamp() + self.max_age_secs,
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to sign session token: {}", e);
            ApiError::internal_error("Failed to create session token")
        })
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| ApiError::unauthorized("Invalid or expired session token"))
    }

    pub fn max_age_secs(&self) -> i64 {
        self.max_age_secs
    }
}
