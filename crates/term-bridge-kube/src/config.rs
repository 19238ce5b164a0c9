//! Cluster connection settings.

use std::path::PathBuf;

use kube::{
    Client, Config,
    config::{KubeConfigOptions, Kubeconfig},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KubeError {
    #[error("Failed to load cluster config: {0}")]
    Config(String),
    #[error("Failed to create cluster client: {0}")]
    Client(#[from] kube::Error),
}

/// Which cluster to talk to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubeConfig {
    /// Kubeconfig context. `None` uses the file's current context.
    pub context: Option<String>,
    /// Explicit kubeconfig file. Ignored when the file does not exist.
    pub kubeconfig: Option<PathBuf>,
}

impl KubeConfig {
    /// Load client settings.
    ///
    /// Lookup order: the explicit kubeconfig file if it exists, then the
    /// default kubeconfig (`$KUBECONFIG` or `~/.kube/config`), then the
    /// in-cluster service account.
    ///
    /// # Errors
    /// Returns error if no usable configuration is found.
    pub async fn load(&self) -> Result<Config, KubeError> {
        let options = KubeConfigOptions {
            context: self.context.clone(),
            ..KubeConfigOptions::default()
        };

        if let Some(path) = self.kubeconfig.as_ref().filter(|p| p.is_file()) {
            tracing::info!(path = %path.display(), "using kubeconfig");
            let kubeconfig =
                Kubeconfig::read_from(path).map_err(|e| KubeError::Config(e.to_string()))?;
            return Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .map_err(|e| KubeError::Config(e.to_string()));
        }

        match Config::from_kubeconfig(&options).await {
            Ok(config) => Ok(config),
            Err(kubeconfig_err) => {
                tracing::debug!("No usable kubeconfig ({kubeconfig_err}), trying in-cluster config");
                Config::incluster().map_err(|e| {
                    KubeError::Config(format!("kubeconfig: {kubeconfig_err}; in-cluster: {e}"))
                })
            }
        }
    }

    /// Build an API client from [`Self::load`].
    ///
    /// # Errors
    /// Returns error if configuration loading or client creation fails.
    pub async fn client(&self) -> Result<Client, KubeError> {
        let config = self.load().await?;
        Ok(Client::try_from(config)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const KUBECONFIG: &str = r"
apiVersion: v1
kind: Config
current-context: dev
clusters:
- name: dev
  cluster:
    server: https://dev.example.com:6443
- name: prod
  cluster:
    server: https://prod.example.com:6443
contexts:
- name: dev
  context:
    cluster: dev
    user: admin
- name: prod
  context:
    cluster: prod
    user: admin
users:
- name: admin
  user:
    token: secret
";

    fn kubeconfig_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(KUBECONFIG.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_explicit_kubeconfig_current_context() {
        let file = kubeconfig_file();
        let config = KubeConfig {
            context: None,
            kubeconfig: Some(file.path().to_path_buf()),
        };
        let loaded = config.load().await.unwrap();
        assert_eq!(loaded.cluster_url.host(), Some("dev.example.com"));
    }

    #[tokio::test]
    async fn test_explicit_kubeconfig_named_context() {
        let file = kubeconfig_file();
        let config = KubeConfig {
            context: Some("prod".into()),
            kubeconfig: Some(file.path().to_path_buf()),
        };
        let loaded = config.load().await.unwrap();
        assert_eq!(loaded.cluster_url.host(), Some("prod.example.com"));
    }

    #[tokio::test]
    async fn test_unknown_context_is_config_error() {
        let file = kubeconfig_file();
        let config = KubeConfig {
            context: Some("staging".into()),
            kubeconfig: Some(file.path().to_path_buf()),
        };
        assert!(matches!(config.load().await, Err(KubeError::Config(_))));
    }
}
