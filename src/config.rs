use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub auth: AuthConfig,
    pub schema: SchemaConfig,
    pub limits: LimitsConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL URL of the HIS warehouse (read-only account)
    pub url: String,
    pub pool_min: u32,
    pub pool_max: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible chat-completions endpoint base
    pub api_base: String,
    pub api_key: String,
    pub model_name: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub secret_key: String,
    pub session_cookie: String,
    /// Session max age in seconds (default 8 hours)
    pub session_max_age_secs: i64,
    /// CSV file with user credentials
    pub users_file: String,
    /// JSON file with the super-user email list
    pub super_users_file: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Directory containing the schema CSV files
    pub dir: String,
    /// YAML file with clinical concept definitions
    pub concepts_file: String,
}

/// Hard runtime limits applied to every guarded query.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Per-statement timeout in milliseconds
    pub statement_timeout_ms: i64,
    /// Maximum rows returned by a query; also the LIMIT ceiling the guard enforces
    pub max_rows: i64,
    /// Number of prior messages passed to the LLM as context
    pub history_window: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Inactivity TTL after which a session expires
    pub ttl_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

/// Command line arguments for configuration overrides
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "carequery")]
#[command(version, about = "CareQuery - Read-only HIS analytics chat service")]
pub struct CommandLineArgs {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Server host (overrides config file)
    #[arg(long, value_name = "HOST")]
    pub server_host: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, value_name = "PORT")]
    pub server_port: Option<u16>,

    /// HIS database URL (overrides config file)
    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,

    /// Schema CSV directory (overrides config file)
    #[arg(long, value_name = "DIR")]
    pub schema_dir: Option<String>,

    /// Logging level (overrides config file, e.g. "info,carequery=debug")
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// SQL statement timeout in milliseconds (overrides config file)
    #[arg(long, value_name = "MS")]
    pub statement_timeout_ms: Option<i64>,

    /// Maximum rows per query (overrides config file)
    #[arg(long, value_name = "ROWS")]
    pub max_rows: Option<i64>,
}

impl Config {
    /// Load configuration with command line, environment variable, and file support
    ///
    /// Loading order (priority from highest to lowest):
    /// 1. Command line arguments
    /// 2. Environment variables (prefixed with APP_)
    /// 3. Configuration file (config.toml)
    /// 4. Default values
    pub fn load() -> Result<Self, anyhow::Error> {
        let cli_args = CommandLineArgs::parse();
        Self::load_with_args(&cli_args)
    }

    pub fn load_with_args(cli_args: &CommandLineArgs) -> Result<Self, anyhow::Error> {
        let config_path = cli_args.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(config_path) = config_path {
            Self::from_toml(&config_path)?
        } else {
            tracing::warn!("Configuration file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(cli_args);
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - APP_SERVER_HOST / APP_SERVER_PORT
    /// - APP_DATABASE_URL
    /// - APP_LLM_API_BASE / APP_LLM_API_KEY / APP_LLM_MODEL
    /// - APP_SECRET_KEY
    /// - APP_SCHEMA_DIR / APP_CONCEPTS_FILE
    /// - APP_STATEMENT_TIMEOUT_MS / APP_MAX_ROWS
    /// - APP_LOG_LEVEL
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("APP_SERVER_HOST") {
            self.server.host = host;
            tracing::info!("Override server.host from env: {}", self.server.host);
        }

        if let Ok(port) = std::env::var("APP_SERVER_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
                tracing::info!("Override server.port from env: {}", self.server.port);
            }
        }

        if let Ok(db_url) = std::env::var("APP_DATABASE_URL") {
            self.database.url = db_url;
            tracing::info!("Override database.url from env");
        }

        if let Ok(api_base) = std::env::var("APP_LLM_API_BASE") {
            self.llm.api_base = api_base;
            tracing::info!("Override llm.api_base from env: {}", self.llm.api_base);
        }

        if let Ok(api_key) = std::env::var("APP_LLM_API_KEY") {
            self.llm.api_key = api_key;
            tracing::info!("Override llm.api_key from env");
        }

        if let Ok(model) = std::env::var("APP_LLM_MODEL") {
            self.llm.model_name = model;
            tracing::info!("Override llm.model_name from env: {}", self.llm.model_name);
        }

        if let Ok(secret) = std::env::var("APP_SECRET_KEY") {
            self.auth.secret_key = secret;
            tracing::info!("Override auth.secret_key from env");
        }

        if let Ok(dir) = std::env::var("APP_SCHEMA_DIR") {
            self.schema.dir = dir;
            tracing::info!("Override schema.dir from env: {}", self.schema.dir);
        }

        if let Ok(file) = std::env::var("APP_CONCEPTS_FILE") {
            self.schema.concepts_file = file;
            tracing::info!("Override schema.concepts_file from env: {}", self.schema.concepts_file);
        }

        if let Ok(timeout) = std::env::var("APP_STATEMENT_TIMEOUT_MS") {
            match timeout.parse() {
                Ok(val) => {
                    self.limits.statement_timeout_ms = val;
                    tracing::info!(
                        "Override limits.statement_timeout_ms from env: {}",
                        self.limits.statement_timeout_ms
                    );
                },
                Err(e) => tracing::warn!(
                    "Invalid APP_STATEMENT_TIMEOUT_MS '{}': {} (keep {})",
                    timeout,
                    e,
                    self.limits.statement_timeout_ms
                ),
            }
        }

        if let Ok(rows) = std::env::var("APP_MAX_ROWS") {
            match rows.parse() {
                Ok(val) => {
                    self.limits.max_rows = val;
                    tracing::info!("Override limits.max_rows from env: {}", self.limits.max_rows);
                },
                Err(e) => tracing::warn!(
                    "Invalid APP_MAX_ROWS '{}': {} (keep {})",
                    rows,
                    e,
                    self.limits.max_rows
                ),
            }
        }

        if let Ok(level) = std::env::var("APP_LOG_LEVEL") {
            self.logging.level = level;
            tracing::info!("Override logging.level from env: {}", self.logging.level);
        }
    }

    /// Apply command line argument overrides (highest priority)
    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(host) = &args.server_host {
            self.server.host = host.clone();
            tracing::info!("Override server.host from CLI: {}", self.server.host);
        }

        if let Some(port) = args.server_port {
            self.server.port = port;
            tracing::info!("Override server.port from CLI: {}", self.server.port);
        }

        if let Some(db_url) = &args.database_url {
            self.database.url = db_url.clone();
            tracing::info!("Override database.url from CLI");
        }

        if let Some(dir) = &args.schema_dir {
            self.schema.dir = dir.clone();
            tracing::info!("Override schema.dir from CLI: {}", self.schema.dir);
        }

        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
            tracing::info!("Override logging.level from CLI: {}", self.logging.level);
        }

        if let Some(timeout) = args.statement_timeout_ms {
            self.limits.statement_timeout_ms = timeout;
            tracing::info!(
                "Override limits.statement_timeout_ms from CLI: {}",
                self.limits.statement_timeout_ms
            );
        }

        if let Some(rows) = args.max_rows {
            self.limits.max_rows = rows;
            tracing::info!("Override limits.max_rows from CLI: {}", self.limits.max_rows);
        }
    }

    /// Validate configuration. Failures here abort startup.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.auth.secret_key == "dev-secret-key-change-in-production" {
            tracing::warn!("Using the default session secret; set APP_SECRET_KEY for production");
        }

        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.pool_min < 1
            || self.database.pool_max > 10
            || self.database.pool_min > self.database.pool_max
        {
            anyhow::bail!(
                "Database pool bounds must satisfy 1 <= pool_min <= pool_max <= 10 (got {}..{})",
                self.database.pool_min,
                self.database.pool_max
            );
        }

        if self.limits.statement_timeout_ms <= 0 {
            anyhow::bail!("limits.statement_timeout_ms must be > 0");
        }

        if self.limits.max_rows <= 0 {
            anyhow::bail!("limits.max_rows must be > 0");
        }

        if self.limits.history_window == 0 {
            anyhow::bail!("limits.history_window must be > 0");
        }

        if self.session.ttl_hours <= 0 {
            anyhow::bail!("session.ttl_hours must be > 0");
        }

        Ok(())
    }

    pub fn schema_dir(&self) -> PathBuf {
        PathBuf::from(&self.schema.dir)
    }

    pub fn concepts_path(&self) -> PathBuf {
        PathBuf::from(&self.schema.concepts_file)
    }

    pub fn users_csv_path(&self) -> PathBuf {
        PathBuf::from(&self.auth.users_file)
    }

    pub fn super_users_path(&self) -> PathBuf {
        PathBuf::from(&self.auth.super_users_file)
    }

    fn find_config_file() -> Option<String> {
        let possible_paths =
            ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];

        for path in &possible_paths {
            if Path::new(path).exists() {
                return Some(path.to_string());
            }
        }
        None
    }

    pub fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8000 }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://readonly@localhost:5432/his".to_string(),
            pool_min: 1,
            pool_max: 10,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model_name: "gpt-4o".to_string(),
            max_tokens: 4096,
            temperature: 0.3,
            timeout_seconds: 60,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: "dev-secret-key-change-in-production".to_string(),
            session_cookie: "carequery_session".to_string(),
            session_max_age_secs: 28800,
            users_file: "usr/users.csv".to_string(),
            super_users_file: "conf/super_users.json".to_string(),
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self { dir: "schema".to_string(), concepts_file: "schema/concepts.yaml".to_string() }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { statement_timeout_ms: 15000, max_rows: 2000, history_window: 6 }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ttl_hours: 24 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info,carequery=debug".to_string(), file: None }
    }
}
