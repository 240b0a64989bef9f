//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - config.toml (default configuration)
//! - config.local.toml (git-ignored local overrides)
//! - Environment variables (SCRIPTEVAL_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # config.toml
//! [script]
//! max_script_bytes = 65536
//! max_rows = 1000000
//!
//! [http]
//! host = "0.0.0.0"
//! port = 50055
//!
//! [http.auth]
//! enabled = true
//! api_keys = ["change-me"]
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! SCRIPTEVAL_SCRIPT__MAX_ROWS=500000
//! SCRIPTEVAL_HTTP__PORT=9000
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "SCRIPTEVAL_";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub script: ScriptConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Per-invocation limits and evaluator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Maximum script text size in bytes. 0 = no limit.
    #[serde(default = "default_max_script_bytes")]
    pub max_script_bytes: usize,

    /// Maximum rows accumulated per invocation. 0 = no limit.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    /// Parsed scripts kept for reuse. 0 disables the cache.
    #[serde(default = "default_parse_cache_size")]
    pub parse_cache_size: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// HTTP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// HTTP server bind address
    #[serde(default = "default_http_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Allowed CORS origins (empty = same-origin only, unless cors_allow_all is true)
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Explicitly allow all CORS origins (dev mode opt-in)
    #[serde(default)]
    pub cors_allow_all: bool,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Bearer API key authentication
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Accepted keys, sent as `Authorization: Bearer <key>`
    #[serde(default)]
    pub api_keys: Vec<String>,
}

// Default value functions
fn default_max_script_bytes() -> usize {
    65_536 // 64 KB
}
fn default_max_rows() -> usize {
    1_000_000
}
fn default_parse_cache_size() -> usize {
    256
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}
fn default_http_host() -> String {
    "127.0.0.1".to_string()
}
fn default_http_port() -> u16 {
    crate::protocol::DEFAULT_PORT
}
fn default_max_body_bytes() -> usize {
    crate::protocol::MAX_MESSAGE_SIZE
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. config.toml (base configuration)
    /// 2. config.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (SCRIPTEVAL_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }

    /// Load configuration from specific file path
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        ScriptConfig {
            max_script_bytes: default_max_script_bytes(),
            max_rows: default_max_rows(),
            parse_cache_size: default_parse_cache_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            host: default_http_host(),
            port: default_http_port(),
            cors_origins: Vec::new(),
            cors_allow_all: false,
            max_body_bytes: default_max_body_bytes(),
            auth: AuthConfig::default(),
        }
    }
}
