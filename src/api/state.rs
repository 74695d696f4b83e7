//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::hook::{ConnectHook, HeaderIdHook};
use crate::stream::Stream;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// The event hub consumers attach to
    pub stream: Arc<Stream>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Assigns identities to new SSE connections
    pub hook: Arc<dyn ConnectHook>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Create state with the default connection hook
    pub fn new(stream: Arc<Stream>, config: ApiConfig) -> Self {
        Self {
            stream,
            config: Arc::new(config),
            hook: Arc::new(HeaderIdHook),
            start_time: Instant::now(),
        }
    }

    /// Replace the hook called when a consumer connects
    pub fn with_hook(mut self, hook: impl ConnectHook + 'static) -> Self {
        self.hook = Arc::new(hook);
        self
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Events buffered per connection before the send timeout applies
    #[serde(default = "default_consumer_buffer")]
    pub consumer_buffer: usize,
    /// How long a delivery may wait on a full connection buffer
    #[serde(default = "default_send_timeout")]
    pub send_timeout_ms: u64,
    /// Interval between SSE keep-alive comments
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8085
}

fn default_consumer_buffer() -> usize {
    64
}

fn default_send_timeout() -> u64 {
    5000
}

fn default_keep_alive() -> u64 {
    15
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            consumer_buffer: default_consumer_buffer(),
            send_timeout_ms: default_send_timeout(),
            keep_alive_secs: default_keep_alive(),
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.addr(), "0.0.0.0:8085");
        assert_eq!(config.send_timeout(), Duration::from_secs(5));
        assert_eq!(config.consumer_buffer, 64);
    }

    #[test]
    fn test_custom_addr() {
        assert_eq!(ApiConfig::new("127.0.0.1", 9000).addr(), "127.0.0.1:9000");
    }
}
