// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Host name every listener binds to
pub const BIND_HOST: &str = "localhost";

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub response: ResponseConfig,
    pub logging: LoggingConfig,
}

/// How accepted connections are scheduled
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServeMode {
    /// Serve each connection to completion before accepting the next
    #[default]
    Serial,
    /// One task per connection
    Concurrent,
}

/// Listener and connection handling configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Port as given on the command line ("0" picks a free port)
    pub port: String,
    pub backlog: i32,
    /// Capacity of the single read performed per connection
    pub buffer_size: usize,
    pub reuse_address: bool,
    #[serde(default)]
    pub mode: ServeMode,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub max_connections: Option<usize>,
    /// Upper bound for the request read; `None` waits forever
    #[serde(default)]
    pub read_timeout_ms: Option<u64>,
    /// How long unread input is discarded after responding
    pub linger_ms: u64,
    /// How long shutdown waits for in-flight connections
    pub shutdown_grace_ms: u64,
    /// Send the response even when the read failed or timed out
    pub respond_on_read_error: bool,
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub const fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }

    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Fixed response configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResponseConfig {
    pub body: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub access_log: bool,
    /// Access log format (common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "common".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            access_log: true,
            access_log_format: default_access_log_format(),
            access_log_file: None,
            error_log_file: None,
        }
    }
}
