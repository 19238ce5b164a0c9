//! Session orchestration for terminal bridges.
//!
//! Provides:
//! - `SessionOrchestrator` - Open, stream and tear down remote terminal sessions
//! - `ClientConnection` - Per-client event handlers
//! - `SessionRegistry` - One active session per client
//! - `stream` - The loop that pumps adapters into a remote process

pub mod config;
pub mod orchestrator;
pub mod registry;
pub mod stream;

pub use config::{ConfigError, ConnectPolicy, SessionConfig};
pub use orchestrator::{ClientConnection, ConnectError, SessionOrchestrator, SessionOutcome, SessionTask};
pub use registry::{SessionInfo, SessionRegistry, SessionState};
pub use stream::{StreamEnd, StreamError, StreamOptions};
