//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::api;
use crate::auth::{DEFAULT_SESSION_MINUTES, MAX_SESSION_MINUTES};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP/WebSocket server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Landing page; relative paths resolve against `static_dir`
    #[serde(default = "default_index_file")]
    pub index_file: PathBuf,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("./static")
}

fn default_index_file() -> PathBuf {
    PathBuf::from("index.html")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
            index_file: default_index_file(),
        }
    }
}

impl ServerConfig {
    /// Landing page path with `static_dir` applied
    pub fn index_path(&self) -> PathBuf {
        if self.index_file.is_absolute() {
            self.index_file.clone()
        } else {
            self.static_dir.join(&self.index_file)
        }
    }
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Categories created at startup if missing
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("agora").join("agora.db"))
        .unwrap_or_else(|| PathBuf::from("./agora_data/agora.db"))
}

fn default_categories() -> Vec<String> {
    ["general", "tech", "news", "sports", "music"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            categories: default_categories(),
        }
    }
}

/// Session and credential configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: i64,

    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

fn default_duration_minutes() -> i64 {
    DEFAULT_SESSION_MINUTES
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_minutes: default_duration_minutes(),
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        // Try default config locations
        let config_paths = [
            dirs::config_dir().map(|p| p.join("agora").join("config.toml")),
            Some(PathBuf::from("/etc/agora/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        // Fall back to environment-only config
        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Reject values that would only fail later, at first use
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_SESSION_MINUTES).contains(&self.session.duration_minutes) {
            return Err(ConfigError::Invalid(format!(
                "session.duration_minutes must be between 1 and {}, got {}",
                MAX_SESSION_MINUTES, self.session.duration_minutes
            )));
        }
        if !(4..=31).contains(&self.session.bcrypt_cost) {
            return Err(ConfigError::Invalid(format!(
                "session.bcrypt_cost must be between 4 and 31, got {}",
                self.session.bcrypt_cost
            )));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::Invalid(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }
        Ok(())
    }

    /// Settings the HTTP layer needs
    pub fn api_config(&self) -> api::ApiConfig {
        api::ApiConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            static_dir: self.server.static_dir.clone(),
            index_file: self.server.index_path(),
            session_minutes: self.session.duration_minutes,
            bcrypt_cost: self.session.bcrypt_cost,
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(host) = lookup("AGORA_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("AGORA_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Some(dir) = lookup("AGORA_STATIC_DIR") {
            self.server.static_dir = PathBuf::from(dir);
        }

        // Store overrides
        if let Some(path) = lookup("AGORA_DATABASE") {
            self.store.database_path = PathBuf::from(path);
        }

        // Session overrides
        if let Some(minutes) = lookup("AGORA_SESSION_MINUTES") {
            match minutes.parse::<i64>() {
                Ok(m) if (1..=MAX_SESSION_MINUTES).contains(&m) => {
                    self.session.duration_minutes = m
                }
                _ => tracing::warn!(value = %minutes, "Ignoring invalid AGORA_SESSION_MINUTES"),
            }
        }

        // Logging overrides
        if let Some(level) = lookup("AGORA_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("AGORA_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Agora Configuration
#
# Environment variables override these settings:
# - AGORA_HOST
# - AGORA_PORT
# - AGORA_STATIC_DIR
# - AGORA_DATABASE
# - AGORA_SESSION_MINUTES
# - AGORA_LOG_LEVEL
# - AGORA_LOG_FORMAT

[server]
# Address to listen on
host = "127.0.0.1"
port = 8080

# Directory served under /static
static_dir = "./static"

# Landing page served for every other path (relative to static_dir)
index_file = "index.html"

[store]
# SQLite database file; created on first start
database_path = "~/.local/share/agora/agora.db"

# Categories created at startup if they do not exist yet
categories = ["general", "tech", "news", "sports", "music"]

[session]
# How long a login stays valid (minutes)
duration_minutes = 15

# bcrypt work factor for stored passwords (4-31)
bcrypt_cost = 12

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.session.duration_minutes, 15);
        assert_eq!(config.logging.format, "pretty");
        assert!(config.store.categories.contains(&"tech".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_generated_template_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.session.bcrypt_cost, 12);
        assert_eq!(config.store.categories.len(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 9000\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.session.duration_minutes, 15);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempdir().unwrap();

        let missing = dir.path().join("missing.toml");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Io { .. })));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[server\nport = ").unwrap();
        assert!(matches!(Config::load(&broken), Err(ConfigError::Parse { .. })));

        let invalid = dir.path().join("invalid.toml");
        std::fs::write(&invalid, "[session]\nduration_minutes = 0\n").unwrap();
        assert!(matches!(Config::load(&invalid), Err(ConfigError::Invalid(_))));

        let huge = dir.path().join("huge.toml");
        std::fs::write(&huge, format!("[session]\nduration_minutes = {}\n", i64::MAX)).unwrap();
        assert!(matches!(Config::load(&huge), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("AGORA_HOST", "0.0.0.0"),
            ("AGORA_PORT", "9100"),
            ("AGORA_DATABASE", "/tmp/board.db"),
            ("AGORA_SESSION_MINUTES", "30"),
            ("AGORA_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.store.database_path, PathBuf::from("/tmp/board.db"));
        assert_eq!(config.session.duration_minutes, 30);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_bad_overrides_are_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            "AGORA_PORT" => Some("not-a-port".to_string()),
            "AGORA_SESSION_MINUTES" => Some("-5".to_string()),
            _ => None,
        });
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.session.duration_minutes, 15);
    }

    #[test]
    fn test_api_config_resolves_index() {
        let mut config = Config::default();
        config.server.static_dir = PathBuf::from("/srv/agora");
        let api = config.api_config();
        assert_eq!(api.index_file, PathBuf::from("/srv/agora/index.html"));

        config.server.index_file = PathBuf::from("/opt/landing.html");
        assert_eq!(config.api_config().index_file, PathBuf::from("/opt/landing.html"));
    }
}
