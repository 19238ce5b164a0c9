//! Child process with plain stdio pipes and no terminal.

use std::process::Stdio;

use async_trait::async_trait;
use term_bridge_core::{
    BackendError, ExecRequest, ExitStatus, OutputChunk, OutputStreams, RemoteProcess,
    TerminalSize,
};
use tokio::{
    io::AsyncWriteExt,
    process::{Child, ChildStderr, ChildStdin, ChildStdout, Command},
};

use crate::backend::SpawnSpec;

pub struct PipeProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    output: OutputStreams<ChildStdout, ChildStderr>,
}

impl PipeProcess {
    pub(crate) fn spawn(spec: SpawnSpec, request: &ExecRequest) -> Result<Self, BackendError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (*k, v.as_str())))
            .stdin(piped_if(request.stdin))
            .stdout(piped_if(request.stdout))
            .stderr(piped_if(request.stderr))
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| BackendError::Open(e.to_string()))?;
        let stdin = child.stdin.take();
        let output = OutputStreams::new(child.stdout.take(), child.stderr.take());

        Ok(Self {
            child,
            stdin,
            output,
        })
    }
}

fn piped_if(enabled: bool) -> Stdio {
    if enabled { Stdio::piped() } else { Stdio::null() }
}

#[async_trait]
impl RemoteProcess for PipeProcess {
    async fn next_output(&mut self) -> Option<Result<OutputChunk, BackendError>> {
        self.output.next().await
    }

    async fn write_stdin(&mut self, data: &[u8]) -> Result<(), BackendError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| BackendError::Stream("stdin already closed".into()))?;
        stdin.write_all(data).await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn close_stdin(&mut self) -> Result<(), BackendError> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.shutdown().await?;
        }
        Ok(())
    }

    async fn resize(&mut self, size: TerminalSize) -> Result<(), BackendError> {
        tracing::trace!(cols = size.cols, rows = size.rows, "ignoring resize without a terminal");
        Ok(())
    }

    async fn abort(&mut self) {
        self.stdin = None;
        if let Err(e) = self.child.start_kill() {
            tracing::debug!("Failed to kill child: {e}");
        }
    }

    async fn wait(&mut self) -> Result<ExitStatus, BackendError> {
        let status = self.child.wait().await?;
        Ok(ExitStatus {
            code: status.code(),
            reason: status.code().is_none().then(|| status.to_string()),
        })
    }
}
