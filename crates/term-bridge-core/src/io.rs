//! Adapters between discrete client events and continuous streams.
//!
//! - `EventSink` turns stdout/stderr chunks into outbound events.
//! - `InputSource` turns inbound keystroke events into a stdin stream.
//! - `ResizeQueue` carries terminal size updates in order.
//!
//! The queues are bounded; producers wait when they are full.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{ByteSink, ByteSource, EventEmitter, PayloadEncoding, SinkError, StreamKind, TerminalSize};

/// Default stdin queue depth.
pub const DEFAULT_INPUT_CAPACITY: usize = 30;

/// Default resize queue depth.
pub const DEFAULT_RESIZE_CAPACITY: usize = 10;

/// Emits each written chunk as one event on the client transport.
pub struct EventSink {
    emitter: Arc<dyn EventEmitter>,
    stream: StreamKind,
    encoding: PayloadEncoding,
}

impl EventSink {
    #[must_use]
    pub fn new(emitter: Arc<dyn EventEmitter>, stream: StreamKind, encoding: PayloadEncoding) -> Self {
        Self {
            emitter,
            stream,
            encoding,
        }
    }
}

#[async_trait]
impl ByteSink for EventSink {
    async fn write(&self, chunk: &[u8]) -> Result<(), SinkError> {
        let event = self.stream.event_name();
        let payload = Value::String(self.encoding.encode(chunk));
        self.emitter.emit(event, Some(payload)).await?;
        tracing::trace!(event, bytes = chunk.len(), "emitted chunk");
        Ok(())
    }
}

/// Create a bounded stdin adapter.
///
/// The handle is the producer side fed by `term:stdin` events; the source is
/// read by the stream loop.
#[must_use]
pub fn input_source(capacity: usize) -> (InputHandle, InputSource) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (InputHandle { tx }, InputSource { rx })
}

/// Producer side of an [`InputSource`].
#[derive(Clone)]
pub struct InputHandle {
    tx: mpsc::Sender<Bytes>,
}

impl InputHandle {
    /// Queue a chunk of input, waiting while the queue is full.
    ///
    /// # Errors
    /// Returns [`SinkError::Closed`] once the session has ended.
    pub async fn accept(&self, chunk: impl Into<Bytes>) -> Result<(), SinkError> {
        self.tx.send(chunk.into()).await.map_err(|_| SinkError::Closed)
    }
}

/// Consumer side of the stdin adapter.
pub struct InputSource {
    rx: mpsc::Receiver<Bytes>,
}

#[async_trait]
impl ByteSource for InputSource {
    async fn read(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }
}

/// Create a bounded resize queue.
#[must_use]
pub fn resize_queue(capacity: usize) -> (ResizeHandle, ResizeQueue) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ResizeHandle { tx }, ResizeQueue { rx })
}

/// Producer side of a [`ResizeQueue`].
#[derive(Clone)]
pub struct ResizeHandle {
    tx: mpsc::Sender<TerminalSize>,
}

impl ResizeHandle {
    /// Queue a size update, waiting while the queue is full.
    ///
    /// # Errors
    /// Returns [`SinkError::Closed`] once the session has ended.
    pub async fn push(&self, cols: u16, rows: u16) -> Result<(), SinkError> {
        self.tx
            .send(TerminalSize::new(cols, rows))
            .await
            .map_err(|_| SinkError::Closed)
    }
}

/// Ordered terminal size updates, drained by the stream loop.
pub struct ResizeQueue {
    rx: mpsc::Receiver<TerminalSize>,
}

impl ResizeQueue {
    /// Wait for the next size update. `None` once the producer is gone.
    ///
    /// Cancel-safe.
    pub async fn next(&mut self) -> Option<TerminalSize> {
        self.rx.recv().await
    }
}
