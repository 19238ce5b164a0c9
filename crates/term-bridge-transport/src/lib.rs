//! Event transport for web terminals.
//!
//! Provides:
//! - Wire framing for named events (`EventFrame`)
//! - WebSocket transport (feature: websocket)

pub mod protocol;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use protocol::{EventFrame, FrameError};
