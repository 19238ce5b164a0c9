//! Core traits for event transports, byte streams and exec backends.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use uuid::Uuid;

use crate::{BackendError, EmitError, ExecRequest, ExecTarget, SinkError, TerminalSize, events};

/// Client connection identifier.
pub type ClientId = Uuid;

/// Session identifier.
pub type SessionId = Uuid;

/// Outbound half of an event transport.
#[async_trait]
pub trait EventEmitter: Send + Sync {
    /// Emit a named event with an optional payload.
    ///
    /// Waits while the transport applies backpressure.
    async fn emit(&self, event: &str, data: Option<Value>) -> Result<(), EmitError>;
}

/// Destination for one direction of a continuous byte stream.
#[async_trait]
pub trait ByteSink: Send + Sync {
    /// Write one chunk. Chunk boundaries are preserved.
    async fn write(&self, chunk: &[u8]) -> Result<(), SinkError>;
}

/// Origin of a continuous byte stream.
#[async_trait]
pub trait ByteSource: Send {
    /// Wait for the next chunk. `None` means the stream has ended.
    ///
    /// Must be cancel-safe: dropping the future never loses a chunk.
    async fn read(&mut self) -> Option<Bytes>;
}

/// Which output stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    /// Event name used for this stream on the client transport.
    #[must_use]
    pub const fn event_name(self) -> &'static str {
        match self {
            Self::Stdout => events::STDOUT,
            Self::Stderr => events::STDERR,
        }
    }
}

/// A chunk of remote output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub stream: StreamKind,
    pub data: Bytes,
}

/// How the remote process ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitStatus {
    /// Exit code, if the backend reports one.
    pub code: Option<i32>,
    /// Backend-provided explanation.
    pub reason: Option<String>,
}

impl ExitStatus {
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// A live remote process with attached streams.
#[async_trait]
pub trait RemoteProcess: Send {
    /// Next chunk of stdout or stderr; `None` once all output streams closed.
    ///
    /// Must be cancel-safe.
    async fn next_output(&mut self) -> Option<Result<OutputChunk, BackendError>>;

    /// Forward input to the process.
    async fn write_stdin(&mut self, data: &[u8]) -> Result<(), BackendError>;

    /// Signal end of input.
    async fn close_stdin(&mut self) -> Result<(), BackendError>;

    /// Apply a terminal size update.
    async fn resize(&mut self, size: TerminalSize) -> Result<(), BackendError>;

    /// Tear the process down without waiting for it.
    async fn abort(&mut self);

    /// Wait for the exit status once output has ended or the process was aborted.
    async fn wait(&mut self) -> Result<ExitStatus, BackendError>;
}

/// Remote execution backend.
#[async_trait]
pub trait ExecBackend: Send + Sync {
    /// Check that the target exists and is reachable.
    async fn resolve(&self, target: &ExecTarget) -> Result<(), BackendError>;

    /// Issue the exec request and return the live process.
    async fn open(&self, request: &ExecRequest) -> Result<Box<dyn RemoteProcess>, BackendError>;
}
