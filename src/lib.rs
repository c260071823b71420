//! CareQuery Library
//!
//! Core modules for the CareQuery analytics service: schema catalog, SQL
//! guard, guarded executor, LLM integration, and the chat orchestrator.

use std::sync::Arc;

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use services::guard::{validate_sql, GuardError, GuardOptions, ValidationResult};
pub use services::{
    CatalogService, ChatOrchestrator, ConceptLibrary, GuardedExecutor, LlmClient,
    LoginRateLimiter, SchemaCatalog, SessionStore, UserStore,
};
pub use utils::JwtUtil;

/// Application shared state
///
/// All services are wrapped in Arc for cheap cloning and thread safety;
/// Rust's type system is the dependency container.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogService>,
    pub executor: Arc<GuardedExecutor>,
    pub orchestrator: Arc<ChatOrchestrator>,
    pub user_store: Arc<UserStore>,
    pub login_limiter: Arc<LoginRateLimiter>,
    pub jwt_util: Arc<JwtUtil>,
    pub session_cookie_name: String,
}

#[cfg(test)]
mod tests;
