pub mod catalog;
pub mod concepts;
pub mod executor;
pub mod guard;
pub mod llm;
pub mod orchestrator;
pub mod rate_limit;
pub mod sanity;
pub mod session_store;
pub mod user_store;

pub use catalog::{CatalogService, SchemaCatalog};
pub use concepts::ConceptLibrary;
pub use executor::GuardedExecutor;
pub use guard::{validate_sql, GuardOptions, ValidationResult};
pub use llm::LlmClient;
pub use orchestrator::ChatOrchestrator;
pub use rate_limit::LoginRateLimiter;
pub use session_store::SessionStore;
pub use user_store::UserStore;
