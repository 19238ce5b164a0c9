//! The stream loop: pumps the session adapters into a remote process.

use std::sync::Arc;

use bytes::Bytes;
use term_bridge_core::{
    BackendError, ByteSink, ByteSource, ExitStatus, OutputChunk, RemoteProcess, ResizeQueue,
    SinkError, StreamKind, TerminalSize,
};
use thiserror::Error;
use tokio::sync::oneshot;

/// Stream loop error. Fatal to the session, never to the process.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("remote stream failed: {0}")]
    Backend(#[from] BackendError),
    #[error("client write failed: {0}")]
    Sink(#[from] SinkError),
}

/// How a stream loop ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// Remote output reached end of stream.
    Completed(ExitStatus),
    /// The abort signal fired.
    Aborted,
}

/// The adapters wired into one remote process.
pub struct StreamOptions {
    pub stdin: Box<dyn ByteSource>,
    pub stdout: Arc<dyn ByteSink>,
    pub stderr: Arc<dyn ByteSink>,
    pub resize: ResizeQueue,
}

/// Run the stream loop until remote output ends, an error occurs or `abort` fires.
///
/// Stdin chunks and resize updates are applied in arrival order; output chunks
/// are written to the matching sink one at a time. A dropped abort sender
/// counts as an abort. On error or abort the remote process is torn down.
///
/// # Errors
/// Returns error on a remote I/O failure or a failed client write.
pub async fn run(
    process: &mut dyn RemoteProcess,
    opts: StreamOptions,
    abort: oneshot::Receiver<()>,
) -> Result<StreamEnd, StreamError> {
    match pump(process, opts, abort).await {
        Ok(true) => Ok(StreamEnd::Completed(process.wait().await?)),
        Ok(false) => {
            process.abort().await;
            Ok(StreamEnd::Aborted)
        }
        Err(e) => {
            process.abort().await;
            Err(e)
        }
    }
}

/// One unit of work picked by the stream loop.
enum Step {
    Output(Option<Result<OutputChunk, BackendError>>),
    Input(Option<Bytes>),
    Resize(Option<TerminalSize>),
}

/// Returns `Ok(true)` at end of output, `Ok(false)` on abort.
async fn pump(
    process: &mut dyn RemoteProcess,
    mut opts: StreamOptions,
    mut abort: oneshot::Receiver<()>,
) -> Result<bool, StreamError> {
    let mut stdin_open = true;
    let mut resize_open = true;

    loop {
        // Abort wins over pending work; the remaining sources share the loop fairly.
        let step = tokio::select! {
            biased;

            _ = &mut abort => return Ok(false),

            step = next_step(&mut *process, &mut opts, stdin_open, resize_open) => step,
        };

        match step {
            Step::Output(Some(Ok(chunk))) => {
                let sink = match chunk.stream {
                    StreamKind::Stdout => &opts.stdout,
                    StreamKind::Stderr => &opts.stderr,
                };
                sink.write(&chunk.data).await?;
            }
            Step::Output(Some(Err(e))) => return Err(e.into()),
            Step::Output(None) => return Ok(true),

            Step::Input(Some(data)) => process.write_stdin(&data).await?,
            Step::Input(None) => {
                stdin_open = false;
                tracing::debug!("stdin closed");
                process.close_stdin().await?;
            }

            Step::Resize(Some(size)) => {
                tracing::debug!(cols = size.cols, rows = size.rows, "applying terminal size");
                if let Err(e) = process.resize(size).await {
                    tracing::warn!("Failed to resize remote terminal: {e}");
                }
            }
            Step::Resize(None) => resize_open = false,
        }
    }
}

/// Wait for whichever source is ready first, picking at random among ready ones.
///
/// Every branch is cancel-safe, so dropping this on abort loses nothing.
async fn next_step(
    process: &mut dyn RemoteProcess,
    opts: &mut StreamOptions,
    stdin_open: bool,
    resize_open: bool,
) -> Step {
    tokio::select! {
        output = process.next_output() => Step::Output(output),
        input = opts.stdin.read(), if stdin_open => Step::Input(input),
        size = opts.resize.next(), if resize_open => Step::Resize(size),
    }
}
