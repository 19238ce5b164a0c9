//! Local exec backend.
//!
//! Provides:
//! - `PtyBackend` - Run the session command on this host, in a PTY or with pipes
//! - Executable resolution utilities

pub mod backend;
pub mod pipe;
pub mod pty;
pub mod shell;

pub use backend::{PtyBackend, PtyConfig};
pub use shell::resolve_executable_path;
