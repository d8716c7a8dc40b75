//! Configuration management.
//!
//! Settings come from an optional TOML file layered under environment
//! variables (`PAPER_SEARCH__STORE__URL`, `PAPER_SEARCH__SERVER__PORT`, ...).
//! Every field has a default, so an empty configuration serves an empty
//! in-memory store on `127.0.0.1:8080`.

mod file_config;

pub use file_config::{find_config_file, render_config, save_config, ConfigFileError};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::QueryLimits;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "PAPER_SEARCH";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub urls: UrlConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Which store implementation serves documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Elasticsearch,
}

/// Document store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// JSON or JSON-lines snapshot for the memory backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default = "default_store_url")]
    pub url: String,

    #[serde(default = "default_index")]
    pub index: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Upper bound on a single store call, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: None,
            url: default_store_url(),
            index: default_index(),
            user: None,
            password: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_store_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_index() -> String {
    "arxiv".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

/// Pagination limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_size")]
    pub default_size: usize,

    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Deepest offset (`start + size`) a query may reach
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_size: default_size(),
            max_size: default_max_size(),
            max_results: default_max_results(),
        }
    }
}

impl SearchConfig {
    pub fn limits(&self) -> QueryLimits {
        QueryLimits {
            default_size: self.default_size,
            max_size: self.max_size,
            max_results: self.max_results,
        }
    }
}

fn default_size() -> usize {
    QueryLimits::default().default_size
}

fn default_max_size() -> usize {
    QueryLimits::default().max_size
}

fn default_max_results() -> usize {
    QueryLimits::default().max_results
}

/// Base URLs used to build `canonical` and `href` links
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlConfig {
    #[serde(default = "default_canonical_base")]
    pub canonical_base: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for UrlConfig {
    fn default() -> Self {
        Self {
            canonical_base: default_canonical_base(),
            api_base: default_api_base(),
        }
    }
}

fn default_canonical_base() -> String {
    "https://arxiv.org/abs".to_string()
}

fn default_api_base() -> String {
    "http://127.0.0.1:8080".to_string()
}

/// Request authentication
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Reject requests without an `Authorization: Bearer <token>` header
    #[serde(default)]
    pub require_bearer_token: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `text` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Settings {
    /// Reject settings that cannot produce a working service
    pub fn validate(&self) -> Result<(), ConfigFileError> {
        let s = &self.search;
        if s.default_size == 0 || s.default_size > s.max_size {
            return Err(ConfigFileError::Invalid(format!(
                "search.default_size must be between 1 and search.max_size ({})",
                s.max_size
            )));
        }
        if s.max_size > s.max_results {
            return Err(ConfigFileError::Invalid(format!(
                "search.max_size ({}) exceeds search.max_results ({})",
                s.max_size, s.max_results
            )));
        }
        if self.store.timeout_ms == 0 {
            return Err(ConfigFileError::Invalid("store.timeout_ms must be positive".into()));
        }
        for (name, value) in [
            ("urls.canonical_base", &self.urls.canonical_base),
            ("urls.api_base", &self.urls.api_base),
        ] {
            url::Url::parse(value)
                .map_err(|e| ConfigFileError::Invalid(format!("{} '{}': {}", name, value, e)))?;
        }
        Ok(())
    }
}

/// Load configuration from an optional file plus environment overrides
pub fn load_config(path: Option<&Path>) -> Result<Settings, ConfigFileError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigFileError::Io(format!("{} does not exist", path.display())));
        }
        builder = builder.add_source(config::File::from(path));
    }

    let settings: Settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| ConfigFileError::Parse(e.to_string()))?;

    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Settings::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.index, "arxiv");
        assert_eq!(config.store.timeout(), Duration::from_secs(5));
        assert_eq!(config.search.limits(), QueryLimits::default());
        assert!(!config.auth.require_bearer_token);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_limits() {
        let mut config = Settings::default();
        config.search.default_size = 5000;
        assert!(matches!(config.validate(), Err(ConfigFileError::Invalid(_))));

        let mut config = Settings::default();
        config.search.max_results = 10;
        assert!(config.validate().is_err());

        let mut config = Settings::default();
        config.urls.api_base = "not a url".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backend_names() {
        let store: StoreConfig = toml::from_str("backend = \"elasticsearch\"").unwrap();
        assert_eq!(store.backend, StoreBackend::Elasticsearch);
        assert_eq!(store.url, "http://localhost:9200");
    }
}
