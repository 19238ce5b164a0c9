//! Core abstractions for terminal session bridging.
//!
//! This crate provides the fundamental building blocks:
//! - Event vocabulary and payloads (`protocol`)
//! - `ExecTarget` / `ExecRequest` - what to run and where
//! - Stream adapters: `EventSink`, `InputSource`, `ResizeQueue`
//! - `OutputStreams` - stdout/stderr reader merging for backends
//! - Seam traits: `ByteSink`, `ByteSource`, `EventEmitter`, `ExecBackend`

pub mod error;
pub mod io;
pub mod protocol;
pub mod reader;
pub mod target;
pub mod traits;

pub use error::{BackendError, EmitError, RequestError, SinkError};
pub use io::{EventSink, InputHandle, InputSource, ResizeHandle, ResizeQueue, input_source, resize_queue};
pub use reader::OutputStreams;
pub use protocol::{ConnectRequest, ErrorCode, ErrorPayload, PayloadEncoding, ResizeRequest, TerminalSize, events};
pub use target::{ExecRequest, ExecTarget, TtyPolicy};
pub use traits::{
    ByteSink, ByteSource, ClientId, EventEmitter, ExecBackend, ExitStatus, OutputChunk,
    RemoteProcess, SessionId, StreamKind,
};
