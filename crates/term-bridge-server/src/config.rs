//! Configuration file loading.
//!
//! The default configuration path is `~/.config/term-bridge/config.toml`.
//! Precedence, lowest first: built-in defaults, the file, `TERM_BRIDGE_*`
//! environment variables, command-line flags.

use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use term_bridge_kube::KubeConfig;
use term_bridge_pty::PtyConfig;
use term_bridge_session::SessionConfig;
use term_bridge_transport::websocket::DEFAULT_OUTBOUND_CAPACITY;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("listen must be a socket address like 127.0.0.1:3000, got {0}")]
    InvalidListen(String),
    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
    #[error("outbound_capacity must be at least 1")]
    ZeroOutboundCapacity,
    #[error("invalid session settings: {0}")]
    Session(#[from] term_bridge_session::ConfigError),
}

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket listener binds to.
    pub listen: String,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Frames queued per client before session output waits.
    pub outbound_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:3000".to_string(),
            log_level: "info".to_string(),
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}

/// Where sessions run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Pod exec through the Kubernetes API.
    #[default]
    Kube,
    /// Local child processes, for development without a cluster.
    Pty,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kube" | "kubernetes" => Ok(Self::Kube),
            "pty" | "local" => Ok(Self::Pty),
            other => Err(format!("unknown backend: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub kube: KubeConfig,
    pub pty: PtyConfig,
}

/// Returns the default configuration file path.
#[must_use]
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("term-bridge")
        .join("config.toml")
}

impl Config {
    /// Load configuration from a file.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is not valid TOML.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("Config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns error if the string is not a valid configuration.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", e.message()))
    }

    /// Apply `TERM_BRIDGE_LISTEN`, `TERM_BRIDGE_LOG_LEVEL` and
    /// `TERM_BRIDGE_BACKEND` from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| var(key).filter(|v| !v.is_empty());

        if let Some(listen) = var("TERM_BRIDGE_LISTEN") {
            tracing::info!("Overriding listen from environment: {listen}");
            self.server.listen = listen;
        }
        if let Some(level) = var("TERM_BRIDGE_LOG_LEVEL") {
            tracing::info!("Overriding log_level from environment: {level}");
            self.server.log_level = level;
        }
        if let Some(backend) = var("TERM_BRIDGE_BACKEND") {
            match backend.parse() {
                Ok(kind) => self.backend.kind = kind,
                Err(e) => tracing::warn!("Ignoring TERM_BRIDGE_BACKEND: {e}"),
            }
        }
    }

    /// Parsed listen address.
    ///
    /// # Errors
    /// Returns error if `server.listen` is not a socket address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .listen
            .parse()
            .map_err(|_| ConfigError::InvalidListen(self.server.listen.clone()))
    }

    /// Validate the configuration values.
    ///
    /// # Errors
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;

        let level = self.server.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.server.log_level.clone()));
        }

        if self.server.outbound_capacity == 0 {
            return Err(ConfigError::ZeroOutboundCapacity);
        }

        self.session.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use term_bridge_core::{PayloadEncoding, TtyPolicy};
    use term_bridge_session::ConnectPolicy;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.listen, "127.0.0.1:3000");
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.server.outbound_capacity, 256);
        assert_eq!(config.session.default_namespace, "default");
        assert_eq!(config.session.command, vec!["sh".to_string()]);
        assert_eq!(config.session.stdin_capacity, 30);
        assert_eq!(config.session.resize_capacity, 10);
        assert_eq!(config.backend.kind, BackendKind::Kube);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("term-bridge/config.toml"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            listen = "0.0.0.0:8080"

            [session]
            command = ["/bin/bash", "-l"]
            tty = "pipes"
            on_duplicate_connect = "replace"
            encoding = "base64"

            [backend]
            kind = "pty"

            [backend.pty]
            targets = ["mongo-0"]
            "#,
        )
        .unwrap();

        assert_eq!(config.server.listen, "0.0.0.0:8080");
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.session.command, vec!["/bin/bash", "-l"]);
        assert_eq!(config.session.tty, TtyPolicy::Pipes);
        assert_eq!(config.session.on_duplicate_connect, ConnectPolicy::Replace);
        assert_eq!(config.session.encoding, PayloadEncoding::Base64);
        assert_eq!(config.session.stdin_capacity, 30);
        assert_eq!(config.backend.kind, BackendKind::Pty);
        assert_eq!(config.backend.pty.targets, vec!["mongo-0"]);
        assert_eq!(config.backend.pty.initial_cols, 80);
        assert!(config.backend.kube.context.is_none());
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml("[server\nlisten = 1").unwrap_err();
        assert!(err.to_string().contains("Invalid TOML configuration"));
        assert!(Config::from_toml("[backend]\nkind = \"docker\"").is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[backend.kube]\ncontext = \"prod\"\nkubeconfig = \"/etc/kube/config\"\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.backend.kube.context.as_deref(), Some("prod"));
        assert_eq!(
            config.backend.kube.kubeconfig,
            Some(PathBuf::from("/etc/kube/config"))
        );
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TERM_BRIDGE_LISTEN", "0.0.0.0:9000"),
            ("TERM_BRIDGE_LOG_LEVEL", "debug"),
            ("TERM_BRIDGE_BACKEND", "pty"),
        ]);
        let mut config = Config::default();
        config.apply_overrides(|k| env.get(k).map(ToString::to_string));

        assert_eq!(config.server.listen, "0.0.0.0:9000");
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.backend.kind, BackendKind::Pty);
    }

    #[test]
    fn test_env_overrides_ignore_empty_and_unknown() {
        let mut config = Config::default();
        config.apply_overrides(|k| match k {
            "TERM_BRIDGE_LISTEN" => Some(String::new()),
            "TERM_BRIDGE_BACKEND" => Some("docker".into()),
            _ => None,
        });
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        config.server.listen = "localhost".into();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidListen("localhost".into()))
        );

        let mut config = Config::default();
        config.server.log_level = "verbose".into();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLogLevel(_))));

        let mut config = Config::default();
        config.server.outbound_capacity = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroOutboundCapacity));

        let mut config = Config::default();
        config.session.command.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Session(_))));
    }

    #[test]
    fn test_backend_kind_from_str() {
        assert_eq!("Kubernetes".parse::<BackendKind>(), Ok(BackendKind::Kube));
        assert_eq!("local".parse::<BackendKind>(), Ok(BackendKind::Pty));
        assert!("docker".parse::<BackendKind>().is_err());
    }
}
