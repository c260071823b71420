//! Configuration tests: defaults, file loading, and validation.

use std::io::Write;

use tempfile::NamedTempFile;

use crate::config::Config;

#[test]
fn test_default_limits() {
    let config = Config::default();
    assert_eq!(config.limits.statement_timeout_ms, 15000);
    assert_eq!(config.limits.max_rows, 2000);
    assert_eq!(config.limits.history_window, 6);
    assert_eq!(config.session.ttl_hours, 24);
}

#[test]
fn test_default_pool_bounds() {
    let config = Config::default();
    assert_eq!(config.database.pool_min, 1);
    assert_eq!(config.database.pool_max, 10);
    assert!(config.validate().is_ok());
}

#[test]
fn test_from_toml_partial_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[server]
port = 9000

[limits]
max_rows = 500
"#
    )
    .unwrap();

    let config = Config::from_toml(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.limits.max_rows, 500);
    // Unspecified sections keep defaults
    assert_eq!(config.limits.statement_timeout_ms, 15000);
    assert_eq!(config.server.host, "0.0.0.0");
}

#[test]
fn test_from_toml_rejects_garbage() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "this is not toml [[[").unwrap();
    assert!(Config::from_toml(file.path().to_str().unwrap()).is_err());
}

#[test]
fn test_validate_rejects_zero_port() {
    let mut config = Config::default();
    config.server.port = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_empty_database_url() {
    let mut config = Config::default();
    config.database.url = String::new();
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_oversized_pool() {
    let mut config = Config::default();
    config.database.pool_max = 50;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.database.pool_min = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_non_positive_limits() {
    let mut config = Config::default();
    config.limits.statement_timeout_ms = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.limits.max_rows = -1;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.limits.history_window = 0;
    assert!(config.validate().is_err());
}
