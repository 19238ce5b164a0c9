//! Error taxonomy shared across the bridge.

use thiserror::Error;

use crate::protocol::ErrorCode;

/// A client request that could not be turned into an action.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Pod name must be specified")]
    MissingPod,
    #[error("Invalid payload encoding: {0}")]
    InvalidEncoding(String),
}

/// Failure to hand an event to the client transport.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("Client disconnected")]
    Disconnected,
    #[error("Failed to encode event: {0}")]
    Encode(String),
}

/// Write failure reported by a [`crate::ByteSink`] or a closed producer handle.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Channel closed")]
    Closed,
    #[error(transparent)]
    Emit(#[from] EmitError),
}

/// Remote execution backend error.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Target not found: {0}")]
    NotFound(String),
    #[error("Target lookup failed: {0}")]
    Lookup(String),
    #[error("Failed to open exec stream: {0}")]
    Open(String),
    #[error("Stream error: {0}")]
    Stream(String),
    #[error("Resize failed: {0}")]
    Resize(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// Client-facing error code for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) | Self::Lookup(_) => ErrorCode::TargetNotFound,
            Self::Open(_) => ErrorCode::OpenFailed,
            Self::Stream(_) | Self::Resize(_) | Self::Io(_) => ErrorCode::StreamFailed,
        }
    }
}
