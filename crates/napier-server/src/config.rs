//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file, or `:memory:`.
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "napier_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Upstream voice API settings.
#[derive(Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_url")]
    pub base_url: String,

    /// Agent that proxied audio is sent to.
    #[serde(default)]
    pub agent_id: String,

    /// Fallback bearer key for upstream calls.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_upstream_timeout_secs")]
    pub timeout_secs: u64,
}

/// API-key enforcement and rate limiting.
#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    /// Reject proxy requests without a valid API key.
    #[serde(default)]
    pub require_api_key: bool,

    /// Key created on startup if it does not exist yet.
    #[serde(default)]
    pub bootstrap_key: Option<String>,

    /// Requests per minute per client IP.
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "napier.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_upstream_url() -> String {
    "https://api.elevenlabs.io/v1".to_string()
}

fn default_upstream_timeout_secs() -> u64 {
    30
}

pub fn default_rate_limit_per_minute() -> u32 {
    120
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_url(),
            agent_id: String::new(),
            api_key: None,
            timeout_secs: default_upstream_timeout_secs(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            require_api_key: false,
            bootstrap_key: None,
            rate_limit_per_minute: default_rate_limit_per_minute(),
        }
    }
}

fn redacted(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "[REDACTED]")
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("agent_id", &self.agent_id)
            .field("api_key", &redacted(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("require_api_key", &self.require_api_key)
            .field("bootstrap_key", &redacted(&self.bootstrap_key))
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .finish()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

fn flag(value: &str) -> bool {
    value == "true" || value == "1"
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `NAPIER_HOST`, `NAPIER_PORT` override `server.*`
/// - `NAPIER_DB_PATH` overrides `database.path`
/// - `NAPIER_LOG_LEVEL`, `NAPIER_LOG_JSON` override `logging.*`
/// - `NAPIER_UPSTREAM_URL`, `NAPIER_UPSTREAM_API_KEY`, `NAPIER_AGENT_ID`
///   override `upstream.*`
/// - `NAPIER_REQUIRE_API_KEY` overrides `auth.require_api_key`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    if let Ok(host) = std::env::var("NAPIER_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("NAPIER_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(db_path) = std::env::var("NAPIER_DB_PATH") {
        config.database.path = db_path;
    }
    if let Ok(level) = std::env::var("NAPIER_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("NAPIER_LOG_JSON") {
        config.logging.json = flag(&json);
    }
    if let Ok(url) = std::env::var("NAPIER_UPSTREAM_URL") {
        config.upstream.base_url = url;
    }
    if let Ok(key) = std::env::var("NAPIER_UPSTREAM_API_KEY") {
        config.upstream.api_key = Some(key).filter(|k| !k.is_empty());
    }
    if let Ok(agent_id) = std::env::var("NAPIER_AGENT_ID") {
        config.upstream.agent_id = agent_id;
    }
    if let Ok(required) = std::env::var("NAPIER_REQUIRE_API_KEY") {
        config.auth.require_api_key = flag(&required);
    }

    Ok(config)
}
