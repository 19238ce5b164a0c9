//! A pod exec stream as a `RemoteProcess`.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{FutureExt, SinkExt, channel::mpsc, future::BoxFuture};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{AttachedProcess, TerminalSize as KubeTerminalSize};
use term_bridge_core::{
    BackendError, ExitStatus, OutputChunk, OutputStreams, RemoteProcess, TerminalSize,
};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

type Reader = Pin<Box<dyn AsyncRead + Send>>;
type Writer = Pin<Box<dyn AsyncWrite + Send>>;

pub struct KubeProcess {
    attached: AttachedProcess,
    stdin: Option<Writer>,
    output: OutputStreams<Reader, Reader>,
    resize: Option<mpsc::Sender<KubeTerminalSize>>,
    exit: Option<BoxFuture<'static, Option<Status>>>,
    status: Option<ExitStatus>,
}

impl KubeProcess {
    pub(crate) fn new(mut attached: AttachedProcess) -> Self {
        let stdin = attached.stdin().map(|w| Box::pin(w) as Writer);
        let stdout = attached.stdout().map(|r| Box::pin(r) as Reader);
        let stderr = attached.stderr().map(|r| Box::pin(r) as Reader);
        let resize = attached.terminal_size();
        let exit = attached.take_status().map(FutureExt::boxed);

        Self {
            attached,
            stdin,
            output: OutputStreams::new(stdout, stderr),
            resize,
            exit,
            status: None,
        }
    }
}

#[async_trait]
impl RemoteProcess for KubeProcess {
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
        let Some(resize) = self.resize.as_mut() else {
            return Ok(());
        };
        resize
            .send(KubeTerminalSize {
                width: size.cols,
                height: size.rows,
            })
            .await
            .map_err(|e| BackendError::Resize(e.to_string()))
    }

    async fn abort(&mut self) {
        self.stdin = None;
        self.resize = None;
        self.attached.abort();
    }

    async fn wait(&mut self) -> Result<ExitStatus, BackendError> {
        if let Some(status) = &self.status {
            return Ok(status.clone());
        }
        let status = match self.exit.take() {
            Some(exit) => exit.await.map_or_else(
                || ExitStatus {
                    code: None,
                    reason: Some("exec stream closed without status".into()),
                },
                |status| exit_status(&status),
            ),
            None => ExitStatus::default(),
        };
        self.status = Some(status.clone());
        Ok(status)
    }
}

/// Map the exec channel's final `Status` to an exit status.
///
/// The API server reports success as `status: Success` and a non-zero exit
/// as a `NonZeroExitCode` failure carrying an `ExitCode` cause.
pub(crate) fn exit_status(status: &Status) -> ExitStatus {
    if status.status.as_deref() == Some("Success") {
        return ExitStatus {
            code: Some(0),
            reason: None,
        };
    }

    let code = status
        .details
        .as_ref()
        .and_then(|d| d.causes.as_ref())
        .and_then(|causes| {
            causes
                .iter()
                .find(|c| c.reason.as_deref() == Some("ExitCode"))
        })
        .and_then(|c| c.message.as_deref())
        .and_then(|m| m.trim().parse().ok());

    ExitStatus {
        code,
        reason: status.message.clone().or_else(|| status.reason.clone()),
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{StatusCause, StatusDetails};

    use super::*;

    #[test]
    fn test_success_status() {
        let status = Status {
            status: Some("Success".into()),
            ..Status::default()
        };
        assert!(exit_status(&status).success());
    }

    #[test]
    fn test_non_zero_exit_code() {
        let status = Status {
            status: Some("Failure".into()),
            reason: Some("NonZeroExitCode".into()),
            message: Some("command terminated with non-zero exit code: exit status 2".into()),
            details: Some(StatusDetails {
                causes: Some(vec![StatusCause {
                    reason: Some("ExitCode".into()),
                    message: Some("2".into()),
                    field: None,
                }]),
                ..StatusDetails::default()
            }),
            ..Status::default()
        };
        let exit = exit_status(&status);
        assert_eq!(exit.code, Some(2));
        assert!(exit.reason.unwrap().contains("exit status 2"));
    }

    #[test]
    fn test_failure_without_code() {
        let status = Status {
            status: Some("Failure".into()),
            reason: Some("InternalError".into()),
            ..Status::default()
        };
        let exit = exit_status(&status);
        assert_eq!(exit.code, None);
        assert_eq!(exit.reason.as_deref(), Some("InternalError"));
        assert!(!exit.success());
    }
}
