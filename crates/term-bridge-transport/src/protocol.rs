//! Wire framing for named events.
//!
//! Every message is a JSON object `{"event": <name>, "data": <payload>}`.
//! `data` is omitted for events without a payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Invalid frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Frame is not UTF-8")]
    NotUtf8,
}

/// One named event on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl EventFrame {
    #[must_use]
    pub fn new(event: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Parse a text frame.
    ///
    /// # Errors
    /// Returns error if the text is not a valid event frame.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parse a binary frame holding UTF-8 JSON.
    ///
    /// # Errors
    /// Returns error if the bytes are not UTF-8 or not a valid event frame.
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        let text = std::str::from_utf8(bytes).map_err(|_| FrameError::NotUtf8)?;
        Self::parse(text)
    }

    /// Serialize to a text frame.
    ///
    /// # Errors
    /// Returns error if the payload cannot be serialized.
    pub fn to_text(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_event_without_data() {
        let text = EventFrame::new("open", None).to_text().unwrap();
        assert_eq!(text, r#"{"event":"open"}"#);

        let frame = EventFrame::parse(r#"{"event":"term:connected"}"#).unwrap();
        assert_eq!(frame.event, "term:connected");
        assert!(frame.data.is_none());
    }

    #[test]
    fn test_event_with_payload() {
        let frame = EventFrame::parse(
            r#"{"event":"term:connect","data":{"namespace":"db","pod":"mongo-0"}}"#,
        )
        .unwrap();
        assert_eq!(frame.event, "term:connect");
        assert_eq!(frame.data, Some(json!({"namespace": "db", "pod": "mongo-0"})));

        let text = EventFrame::new("term:stdout", Some(json!("$ "))).to_text().unwrap();
        assert_eq!(text, r#"{"event":"term:stdout","data":"$ "}"#);
    }

    #[test]
    fn test_binary_frame() {
        let frame = EventFrame::parse_bytes(br#"{"event":"term:stdin","data":"ls\r"}"#).unwrap();
        assert_eq!(frame.data, Some(json!("ls\r")));
        assert!(matches!(
            EventFrame::parse_bytes(&[0xff, 0xfe]),
            Err(FrameError::NotUtf8)
        ));
    }

    #[test]
    fn test_invalid_frames() {
        assert!(matches!(EventFrame::parse("not json"), Err(FrameError::Json(_))));
        assert!(matches!(EventFrame::parse(r#"{"data":1}"#), Err(FrameError::Json(_))));
    }
}
