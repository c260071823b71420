pub mod error;
pub mod jwt;
pub mod role_filter;

pub use error::{ApiError, ApiResult};
pub use jwt::{Claims, JwtUtil};
pub use role_filter::redact_for_role;
