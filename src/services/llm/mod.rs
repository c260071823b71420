//! LLM integration: transport client, prompt context builders, and the
//! structured plan contract.
//!
//! The LLM is treated as an untrusted producer: its output is parsed into a
//! fixed record shape, a malformed payload collapses to
//! clarification-needed, and raw LLM text never reaches the executor.

mod client;
mod context;
mod models;

pub use client::LlmClient;
pub use context::{build_concepts_context, build_schema_context};
pub use models::LlmError;
