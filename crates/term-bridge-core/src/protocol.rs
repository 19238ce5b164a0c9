//! Event vocabulary and payloads exchanged with the client.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{ExecTarget, RequestError};

/// Event names on the client transport.
pub mod events {
    /// Sent immediately when a client connects.
    pub const OPEN: &str = "open";
    /// Client asks for a terminal session.
    pub const CONNECT: &str = "term:connect";
    /// Session opened, streaming is about to start.
    pub const CONNECTED: &str = "term:connected";
    pub const STDIN: &str = "term:stdin";
    pub const STDOUT: &str = "term:stdout";
    pub const STDERR: &str = "term:stderr";
    pub const RESIZE: &str = "term:resize";
    /// Session ended, for any reason.
    pub const TERMINATED: &str = "term:terminated";
    /// Session refused or failed.
    pub const ERROR: &str = "term:error";
    /// Raised by the transport when the client goes away.
    pub const DISCONNECTION: &str = "disconnection";
}

/// How byte chunks are represented as string payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadEncoding {
    /// UTF-8 text; invalid sequences are replaced.
    #[default]
    Text,
    /// Standard base64, exact byte round-trip.
    Base64,
}

impl PayloadEncoding {
    /// Encode a chunk for the wire.
    #[must_use]
    pub fn encode(self, data: &[u8]) -> String {
        match self {
            Self::Text => String::from_utf8_lossy(data).into_owned(),
            Self::Base64 => BASE64.encode(data),
        }
    }

    /// Decode a wire payload into bytes.
    ///
    /// # Errors
    /// Returns error if the payload is not valid for this encoding.
    pub fn decode(self, data: &str) -> Result<Vec<u8>, RequestError> {
        match self {
            Self::Text => Ok(data.as_bytes().to_vec()),
            Self::Base64 => BASE64
                .decode(data)
                .map_err(|e| RequestError::InvalidEncoding(e.to_string())),
        }
    }

    /// Decode a stdin event payload, which must be a raw string.
    ///
    /// # Errors
    /// Returns error if the payload is missing, not a string, or not decodable.
    pub fn decode_value(self, data: Option<&Value>) -> Result<Vec<u8>, RequestError> {
        match data {
            Some(Value::String(s)) => self.decode(s),
            Some(other) => Err(RequestError::InvalidPayload(format!(
                "expected string, got {other}"
            ))),
            None => Err(RequestError::InvalidPayload("missing payload".into())),
        }
    }
}

/// Terminal geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    pub cols: u16,
    pub rows: u16,
}

impl TerminalSize {
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

/// Payload of `term:connect`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRequest {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub pod: String,
    #[serde(default)]
    pub container: String,
}

impl ConnectRequest {
    /// Parse a connect payload.
    ///
    /// Accepts either a JSON object or a string holding JSON.
    ///
    /// # Errors
    /// Returns error if the payload is missing or malformed.
    pub fn from_payload(data: Option<&Value>) -> Result<Self, RequestError> {
        parse_payload(data)
    }

    /// Validate and resolve defaults.
    ///
    /// An empty namespace becomes `default_namespace`; an empty container
    /// means the target's default container.
    ///
    /// # Errors
    /// Returns [`RequestError::MissingPod`] if no pod name was given.
    pub fn into_target(self, default_namespace: &str) -> Result<ExecTarget, RequestError> {
        let pod = self.pod.trim();
        if pod.is_empty() {
            return Err(RequestError::MissingPod);
        }
        let namespace = match self.namespace.trim() {
            "" => default_namespace.to_string(),
            ns => ns.to_string(),
        };
        let container = match self.container.trim() {
            "" => None,
            c => Some(c.to_string()),
        };
        Ok(ExecTarget {
            namespace,
            pod: pod.to_string(),
            container,
        })
    }
}

/// Payload of `term:resize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeRequest {
    pub cols: u16,
    pub rows: u16,
}

impl ResizeRequest {
    /// Parse a resize payload (object or string holding JSON).
    ///
    /// # Errors
    /// Returns error if the payload is missing or malformed.
    pub fn from_payload(data: Option<&Value>) -> Result<Self, RequestError> {
        parse_payload(data)
    }
}

impl From<ResizeRequest> for TerminalSize {
    fn from(r: ResizeRequest) -> Self {
        Self::new(r.cols, r.rows)
    }
}

/// Client-facing error codes carried by `term:error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    TargetNotFound,
    SessionActive,
    OpenFailed,
    StreamFailed,
}

/// Payload of `term:error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorPayload {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Convert to an event payload.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::json!({ "code": self.code, "message": self.message })
    }
}

fn parse_payload<T: DeserializeOwned>(data: Option<&Value>) -> Result<T, RequestError> {
    match data {
        Some(Value::String(raw)) => Ok(serde_json::from_str(raw)?),
        Some(value @ Value::Object(_)) => Ok(T::deserialize(value)?),
        Some(other) => Err(RequestError::InvalidPayload(format!(
            "expected object, got {other}"
        ))),
        None => Err(RequestError::InvalidPayload("missing payload".into())),
    }
}
