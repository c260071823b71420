use serde::{Deserialize, Serialize};

/// Caller role. Gates post-execution redaction only; it never alters what
/// is generated, validated, or executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    StandardUser,
    SuperUser,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StandardUser => "standard_user",
            Self::SuperUser => "super_user",
        }
    }

    pub fn is_super(&self) -> bool {
        matches!(self, Self::SuperUser)
    }
}

/// Authenticated user information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub email: String,
    pub name: String,
    pub department: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub email: String,
    pub name: String,
    pub department: String,
    pub role: UserRole,
}

impl From<UserInfo> for LoginResponse {
    fn from(user: UserInfo) -> Self {
        Self {
            email: user.email,
            name: user.name,
            department: user.department,
            role: user.role,
        }
    }
}
