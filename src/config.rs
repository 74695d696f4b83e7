//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::api::ApiConfig;
use crate::stream::StreamConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, for development
    #[default]
    Pretty,
    /// One JSON object per line, for production
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
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

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
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
        let config_paths = [
            dirs::config_dir().map(|p| p.join("eventsource").join("config.toml")),
            Some(PathBuf::from("/etc/eventsource/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // API overrides
        if let Some(host) = var("EVENTSOURCE_HOST") {
            self.api.host = host;
        }
        if let Some(port) = var("EVENTSOURCE_PORT").and_then(|p| p.parse().ok()) {
            self.api.port = port;
        }

        // Stream overrides
        if let Some(capacity) = var("EVENTSOURCE_INTAKE_CAPACITY").and_then(|c| c.parse().ok()) {
            self.stream.intake_capacity = capacity;
        }

        // Logging overrides
        if let Some(level) = var("EVENTSOURCE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("EVENTSOURCE_LOG_FORMAT").and_then(|f| f.parse().ok()) {
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
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Eventsource Configuration
#
# Environment variables override these settings:
# - EVENTSOURCE_HOST
# - EVENTSOURCE_PORT
# - EVENTSOURCE_INTAKE_CAPACITY
# - EVENTSOURCE_LOG_LEVEL
# - EVENTSOURCE_LOG_FORMAT

[stream]
# Events queued between producers and the dispatcher
intake_capacity = 1024

# Delivery of one event to its consumers: "concurrent" or "sequential"
delivery = "concurrent"

# Send a "topic-closed" event to subscribers when a topic is closed
notify_topic_close = true

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8085

# Events buffered per SSE connection
consumer_buffer = 64

# Milliseconds a delivery may wait on a full buffer before the consumer is dropped
send_timeout_ms = 5000

# Seconds between SSE keep-alive comments
keep_alive_secs = 15

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
    use crate::stream::DeliveryMode;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.stream.intake_capacity, 1024);
        assert_eq!(config.stream.delivery, DeliveryMode::Concurrent);
        assert_eq!(config.api.port, 8085);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::parse(
            r#"
            [stream]
            delivery = "sequential"
            "#,
        )
        .unwrap();

        assert_eq!(config.stream.delivery, DeliveryMode::Sequential);
        assert!(config.stream.notify_topic_close);
        assert_eq!(config.api.consumer_buffer, 64);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[api]\nport = 9999\n[logging]\nformat = \"json\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.api.port, 9999);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_errors() {
        let missing = Config::load(Path::new("/nonexistent/eventsource.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[stream]\nintake_capacity = \"lots\"").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("EVENTSOURCE_PORT", "7000"),
            ("EVENTSOURCE_INTAKE_CAPACITY", "16"),
            ("EVENTSOURCE_LOG_FORMAT", "JSON"),
            ("EVENTSOURCE_HOST", "127.0.0.1"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.api.port, 7000);
        assert_eq!(config.api.host, "127.0.0.1");
        assert_eq!(config.stream.intake_capacity, 16);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == "EVENTSOURCE_PORT").then(|| "abc".to_string()));
        assert_eq!(config.api.port, 8085);
    }
}
