//! `ExecBackend` over the Kubernetes pod exec subresource.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client, api::AttachParams};
use term_bridge_core::{BackendError, ExecBackend, ExecRequest, ExecTarget, RemoteProcess};

use crate::{
    config::{KubeConfig, KubeError},
    process::KubeProcess,
};

#[derive(Clone)]
pub struct KubeBackend {
    client: Client,
}

impl KubeBackend {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the given cluster settings.
    ///
    /// # Errors
    /// Returns error if no cluster configuration can be loaded.
    pub async fn connect(config: &KubeConfig) -> Result<Self, KubeError> {
        Ok(Self::new(config.client().await?))
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ExecBackend for KubeBackend {
    async fn resolve(&self, target: &ExecTarget) -> Result<(), BackendError> {
        let pod = self
            .pods(&target.namespace)
            .get(&target.pod)
            .await
            .map_err(|e| lookup_error(target, e))?;

        match &target.container {
            Some(container) if !has_container(&pod, container) => {
                Err(BackendError::NotFound(target.to_string()))
            }
            _ => Ok(()),
        }
    }

    async fn open(&self, request: &ExecRequest) -> Result<Box<dyn RemoteProcess>, BackendError> {
        let attached = self
            .pods(&request.target.namespace)
            .exec(
                &request.target.pod,
                request.command.clone(),
                &attach_params(request),
            )
            .await
            .map_err(|e| BackendError::Open(e.to_string()))?;

        Ok(Box::new(KubeProcess::new(attached)))
    }
}

fn attach_params(request: &ExecRequest) -> AttachParams {
    let params = AttachParams::default()
        .stdin(request.stdin)
        .stdout(request.stdout)
        .stderr(request.stderr)
        .tty(request.tty);
    match &request.target.container {
        Some(container) => params.container(container.clone()),
        None => params,
    }
}

fn has_container(pod: &Pod, name: &str) -> bool {
    pod.spec
        .as_ref()
        .is_some_and(|spec| spec.containers.iter().any(|c| c.name == name))
}

fn lookup_error(target: &ExecTarget, err: kube::Error) -> BackendError {
    match err {
        kube::Error::Api(resp) if resp.code == 404 => BackendError::NotFound(target.to_string()),
        other => BackendError::Lookup(other.to_string()),
    }
}
