//! Session settings.

use serde::{Deserialize, Serialize};
use term_bridge_core::{
    PayloadEncoding, TtyPolicy,
    io::{DEFAULT_INPUT_CAPACITY, DEFAULT_RESIZE_CAPACITY},
};
use thiserror::Error;

/// What to do with a `term:connect` while the client already has a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectPolicy {
    /// Refuse the new request with a `session_active` error.
    #[default]
    Reject,
    /// Abort the running session and start the new one.
    Replace,
}

/// Session configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("command must not be empty")]
    EmptyCommand,
    #[error("default_namespace must not be empty")]
    EmptyNamespace,
    #[error("{0} must be at least 1")]
    ZeroCapacity(&'static str),
}

/// Per-session behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Namespace used when a connect request leaves it empty.
    pub default_namespace: String,

    /// Command run in the target container.
    pub command: Vec<String>,

    /// Stream flags for the remote process.
    pub tty: TtyPolicy,

    /// Behaviour on a second connect from the same client.
    pub on_duplicate_connect: ConnectPolicy,

    /// Depth of the stdin queue.
    pub stdin_capacity: usize,

    /// Depth of the resize queue.
    pub resize_capacity: usize,

    /// Representation of stdin/stdout/stderr payloads.
    pub encoding: PayloadEncoding,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_namespace: "default".to_string(),
            command: vec!["sh".to_string()],
            tty: TtyPolicy::default(),
            on_duplicate_connect: ConnectPolicy::default(),
            stdin_capacity: DEFAULT_INPUT_CAPACITY,
            resize_capacity: DEFAULT_RESIZE_CAPACITY,
            encoding: PayloadEncoding::default(),
        }
    }
}

impl SessionConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command.first().is_none_or(|c| c.trim().is_empty()) {
            return Err(ConfigError::EmptyCommand);
        }
        if self.default_namespace.trim().is_empty() {
            return Err(ConfigError::EmptyNamespace);
        }
        if self.stdin_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("stdin_capacity"));
        }
        if self.resize_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("resize_capacity"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = SessionConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.command, vec!["sh"]);
        assert_eq!(config.stdin_capacity, 30);
        assert_eq!(config.resize_capacity, 10);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = SessionConfig {
            command: vec![],
            ..SessionConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyCommand));

        let config = SessionConfig {
            resize_capacity: 0,
            ..SessionConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroCapacity("resize_capacity")));
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"tty": "pipes", "on_duplicate_connect": "replace"}"#).unwrap();
        assert_eq!(config.tty, TtyPolicy::Pipes);
        assert_eq!(config.on_duplicate_connect, ConnectPolicy::Replace);
        assert_eq!(config.default_namespace, "default");
    }
}
