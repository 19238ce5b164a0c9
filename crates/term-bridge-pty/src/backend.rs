//! `ExecBackend` that runs the session command on the local host.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use term_bridge_core::{
    BackendError, ExecBackend, ExecRequest, ExecTarget, RemoteProcess, TerminalSize,
};

use crate::{pipe::PipeProcess, pty::PtyProcess, shell::resolve_executable_path};

/// Local backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PtyConfig {
    /// Working directory for spawned commands. Defaults to the server's cwd.
    pub working_dir: Option<PathBuf>,
    /// Pod names accepted as targets. Empty accepts any name.
    pub targets: Vec<String>,
    /// Terminal size before the client's first resize.
    pub initial_cols: u16,
    pub initial_rows: u16,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            working_dir: None,
            targets: Vec::new(),
            initial_cols: 80,
            initial_rows: 24,
        }
    }
}

/// Runs every target's command as a local child process.
///
/// The target namespace, pod and container are exported to the child as
/// `TERM_BRIDGE_NAMESPACE`, `TERM_BRIDGE_POD` and `TERM_BRIDGE_CONTAINER`.
#[derive(Debug, Clone, Default)]
pub struct PtyBackend {
    config: PtyConfig,
}

impl PtyBackend {
    #[must_use]
    pub const fn new(config: PtyConfig) -> Self {
        Self { config }
    }

    fn env_for(target: &ExecTarget) -> Vec<(&'static str, String)> {
        let mut env = vec![
            ("TERM", "xterm-256color".to_string()),
            ("TERM_BRIDGE_NAMESPACE", target.namespace.clone()),
            ("TERM_BRIDGE_POD", target.pod.clone()),
        ];
        if let Some(container) = &target.container {
            env.push(("TERM_BRIDGE_CONTAINER", container.clone()));
        }
        env
    }
}

#[async_trait]
impl ExecBackend for PtyBackend {
    async fn resolve(&self, target: &ExecTarget) -> Result<(), BackendError> {
        if self.config.targets.is_empty() || self.config.targets.contains(&target.pod) {
            Ok(())
        } else {
            Err(BackendError::NotFound(target.to_string()))
        }
    }

    async fn open(&self, request: &ExecRequest) -> Result<Box<dyn RemoteProcess>, BackendError> {
        let Some((program, args)) = request.command.split_first() else {
            return Err(BackendError::Open("empty command".into()));
        };
        let program = resolve_executable_path(program)
            .await
            .ok_or_else(|| BackendError::Open(format!("executable not found: {program}")))?;

        let spawn = SpawnSpec {
            program,
            args: args.to_vec(),
            env: Self::env_for(&request.target),
            working_dir: self.config.working_dir.clone(),
        };

        tracing::debug!(
            program = %spawn.program.display(),
            tty = request.tty,
            "spawning local process"
        );

        if request.tty {
            let size = TerminalSize::new(self.config.initial_cols, self.config.initial_rows);
            Ok(Box::new(PtyProcess::spawn(spawn, size)?))
        } else {
            Ok(Box::new(PipeProcess::spawn(spawn, request)?))
        }
    }
}

/// Resolved command line and environment for a child process.
pub(crate) struct SpawnSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(&'static str, String)>,
    pub working_dir: Option<PathBuf>,
}
