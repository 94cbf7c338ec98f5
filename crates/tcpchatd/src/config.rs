//! Server configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, an
//! optional TOML file, environment variables, and the positional port
//! argument. The last two are applied by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Default TCP port
pub const DEFAULT_PORT: u16 = 8989;

/// Default bind host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Maximum number of concurrent chat sessions
pub const DEFAULT_MAX_CLIENTS: usize = 10;

/// Capacity of each session's outbound queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Longest accepted input line, terminator included
pub const DEFAULT_MAX_LINE_BYTES: usize = 4096;

/// Time between the shutdown notice and force-closing sessions
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 50;

/// Default transcript file, relative to the working directory
pub const DEFAULT_TRANSCRIPT_PATH: &str = "chat.log";

/// What the dispatcher does when a session's outbound queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanoutPolicy {
    /// Wait for space. A stalled client delays every other client.
    #[default]
    Block,

    /// Disconnect the stalled client and move on.
    Disconnect,
}

/// Complete server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// TCP port (0 picks a free port)
    pub port: u16,

    /// Admission limit
    pub max_clients: usize,

    /// Per-session outbound queue capacity
    pub queue_capacity: usize,

    /// Input lines longer than this disconnect the client
    pub max_line_bytes: usize,

    /// Grace period before force-closing sessions on shutdown
    pub shutdown_grace_ms: u64,

    /// Where chat history is appended
    pub transcript_path: PathBuf,

    /// Full-queue behaviour of the dispatcher
    pub fanout_policy: FanoutPolicy,

    /// Delete the transcript when the server stops
    pub remove_transcript_on_exit: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_clients: DEFAULT_MAX_CLIENTS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
            transcript_path: PathBuf::from(DEFAULT_TRANSCRIPT_PATH),
            fanout_policy: FanoutPolicy::Block,
            remove_transcript_on_exit: true,
        }
    }
}

impl ServerConfig {
    /// Parses a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Checks values that would make the server unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_clients == 0 {
            return Err(ConfigError::Invalid("max_clients must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue_capacity must be at least 1".into(),
            ));
        }
        if self.max_line_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_line_bytes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Address string for the listener, e.g. `0.0.0.0:8989`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Shutdown grace period as a `Duration`.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {error}", .path.display())]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8989);
        assert_eq!(config.max_clients, 10);
        assert_eq!(config.queue_capacity, 10);
        assert_eq!(config.fanout_policy, FanoutPolicy::Block);
        assert_eq!(config.bind_addr(), "0.0.0.0:8989");
        assert_eq!(config.shutdown_grace(), Duration::from_millis(50));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServerConfig::from_toml_str(
            r#"
            port = 9000
            fanout_policy = "disconnect"
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.fanout_policy, FanoutPolicy::Disconnect);
        assert_eq!(config.max_clients, DEFAULT_MAX_CLIENTS);
        assert_eq!(config.transcript_path, PathBuf::from("chat.log"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = ServerConfig::from_toml_str("max_client = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_limits_rejected() {
        let err = ServerConfig::from_toml_str("max_clients = 0").unwrap_err();
        assert!(err.to_string().contains("max_clients"));

        let err = ServerConfig::from_toml_str("queue_capacity = 0").unwrap_err();
        assert!(err.to_string().contains("queue_capacity"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ServerConfig::load(Path::new("/nonexistent/tcpchat.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tcpchat.toml"));
    }
}
