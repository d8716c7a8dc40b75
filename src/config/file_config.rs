//! Configuration file support.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [store]
//! backend = "elasticsearch"   # or "memory"
//! path = "./papers.jsonl"     # memory backend only
//! url = "http://localhost:9200"
//! index = "arxiv"
//! user = "elastic"
//! password = "changeme"
//! timeout_ms = 5000
//!
//! [search]
//! default_size = 50
//! max_size = 2000
//! max_results = 10000
//!
//! [urls]
//! canonical_base = "https://arxiv.org/abs"
//! api_base = "https://api.example.org/papers"
//!
//! [auth]
//! require_bearer_token = false
//!
//! [logging]
//! level = "info"
//! format = "text"             # or "json"
//! ```

use std::path::{Path, PathBuf};

use super::Settings;

/// File name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "paper-search.toml";

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Locate a configuration file: `./paper-search.toml`, then
/// `<config_dir>/paper-search/config.toml`
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("paper-search").join("config.toml"))
        .filter(|path| path.is_file())
}

/// Render settings as TOML
pub fn render_config(settings: &Settings) -> Result<String, ConfigFileError> {
    toml::to_string_pretty(settings).map_err(|e| ConfigFileError::Serialize(e.to_string()))
}

/// Write settings to a TOML file
pub fn save_config(settings: &Settings, path: &Path) -> Result<(), ConfigFileError> {
    let content = render_config(settings)?;
    std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
}
