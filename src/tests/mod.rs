// Test modules

mod catalog_test;
pub mod common;
mod concepts_test;
mod config_test;
mod jwt_test;
mod phi_blocking_test;
mod role_filter_test;
mod sanity_test;
mod session_test;
mod user_store_test;
