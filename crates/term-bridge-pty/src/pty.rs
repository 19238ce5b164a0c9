//! Child process attached to a local pseudo-terminal.
//!
//! portable-pty only offers blocking handles, so each one gets a thread:
//! a reader feeding an mpsc channel, a writer draining one, and a waiter
//! reporting the exit status.

use std::io::{Read, Write};

use async_trait::async_trait;
use bytes::Bytes;
use portable_pty::{ChildKiller, CommandBuilder, MasterPty, PtySize, native_pty_system};
use term_bridge_core::{
    BackendError, ExitStatus, OutputChunk, RemoteProcess, StreamKind, TerminalSize,
};
use tokio::sync::{mpsc, oneshot};

use crate::backend::SpawnSpec;

const READ_BUFFER_SIZE: usize = 4096;
const CHANNEL_CAPACITY: usize = 64;

pub struct PtyProcess {
    master: Box<dyn MasterPty + Send>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    output: mpsc::Receiver<Bytes>,
    input: Option<mpsc::Sender<Bytes>>,
    exit: Option<oneshot::Receiver<ExitStatus>>,
    status: Option<ExitStatus>,
}

impl PtyProcess {
    pub(crate) fn spawn(spec: SpawnSpec, size: TerminalSize) -> Result<Self, BackendError> {
        let pair = native_pty_system()
            .openpty(pty_size(size))
            .map_err(|e| BackendError::Open(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&spec.program);
        cmd.args(&spec.args);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &spec.working_dir {
            cmd.cwd(dir);
        }

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| BackendError::Open(e.to_string()))?;
        // The master only sees EOF once no slave handle remains open here.
        drop(pair.slave);

        let killer = child.clone_killer();
        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| BackendError::Open(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| BackendError::Open(e.to_string()))?;

        let (output_tx, output) = mpsc::channel(CHANNEL_CAPACITY);
        let (input, input_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (exit_tx, exit) = oneshot::channel();

        std::thread::spawn(move || read_loop(reader, &output_tx));
        std::thread::spawn(move || write_loop(writer, input_rx));
        std::thread::spawn(move || {
            let status = match child.wait() {
                Ok(status) => ExitStatus {
                    code: i32::try_from(status.exit_code()).ok(),
                    reason: None,
                },
                Err(e) => ExitStatus {
                    code: None,
                    reason: Some(e.to_string()),
                },
            };
            let _ = exit_tx.send(status);
        });

        Ok(Self {
            master: pair.master,
            killer,
            output,
            input: Some(input),
            exit: Some(exit),
            status: None,
        })
    }
}

fn read_loop(mut reader: Box<dyn Read + Send>, output: &mpsc::Sender<Bytes>) {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if output.blocking_send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                    break;
                }
            }
            // Linux reports EIO on the master once the child side has gone.
            Err(e) => {
                tracing::trace!("PTY read ended: {e}");
                break;
            }
        }
    }
}

fn write_loop(mut writer: Box<dyn Write + Send>, mut input: mpsc::Receiver<Bytes>) {
    while let Some(data) = input.blocking_recv() {
        if let Err(e) = writer.write_all(&data).and_then(|()| writer.flush()) {
            tracing::debug!("PTY write failed: {e}");
            break;
        }
    }
}

const fn pty_size(size: TerminalSize) -> PtySize {
    PtySize {
        rows: size.rows,
        cols: size.cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

#[async_trait]
impl RemoteProcess for PtyProcess {
    async fn next_output(&mut self) -> Option<Result<OutputChunk, BackendError>> {
        let data = self.output.recv().await?;
        Some(Ok(OutputChunk {
            stream: StreamKind::Stdout,
            data,
        }))
    }

    async fn write_stdin(&mut self, data: &[u8]) -> Result<(), BackendError> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| BackendError::Stream("stdin already closed".into()))?;
        input
            .send(Bytes::copy_from_slice(data))
            .await
            .map_err(|_| BackendError::Stream("PTY writer stopped".into()))
    }

    async fn close_stdin(&mut self) -> Result<(), BackendError> {
        // Dropping the master writer sends EOF to the line discipline.
        self.input = None;
        Ok(())
    }

    async fn resize(&mut self, size: TerminalSize) -> Result<(), BackendError> {
        self.master
            .resize(pty_size(size))
            .map_err(|e| BackendError::Resize(e.to_string()))
    }

    async fn abort(&mut self) {
        self.input = None;
        if self.status.is_some() {
            return;
        }
        if let Err(e) = self.killer.kill() {
            tracing::debug!("Failed to kill PTY child: {e}");
        }
    }

    async fn wait(&mut self) -> Result<ExitStatus, BackendError> {
        if let Some(status) = &self.status {
            return Ok(status.clone());
        }
        let exit = self
            .exit
            .take()
            .ok_or_else(|| BackendError::Stream("exit status unavailable".into()))?;
        let status = exit
            .await
            .map_err(|_| BackendError::Stream("PTY waiter stopped".into()))?;
        self.status = Some(status.clone());
        Ok(status)
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        if self.status.is_none() {
            let _ = self.killer.kill();
        }
    }
}
