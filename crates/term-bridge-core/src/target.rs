//! Remote execution target and request.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of the remote compute unit a session runs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecTarget {
    pub namespace: String,
    pub pod: String,
    /// `None` selects the default container.
    pub container: Option<String>,
}

impl fmt::Display for ExecTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.pod)?;
        if let Some(container) = &self.container {
            write!(f, ":{container}")?;
        }
        Ok(())
    }
}

/// Stream flags for the remote process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtyPolicy {
    /// Full interactive terminal. stderr is merged into stdout by the TTY.
    #[default]
    Interactive,
    /// Plain pipes: separate stdout and stderr, no terminal.
    Pipes,
}

/// A fully specified exec request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    pub target: ExecTarget,
    pub command: Vec<String>,
    pub stdin: bool,
    pub stdout: bool,
    pub stderr: bool,
    pub tty: bool,
}

impl ExecRequest {
    /// Build a request for an interactive session.
    #[must_use]
    pub fn new(target: ExecTarget, command: Vec<String>, policy: TtyPolicy) -> Self {
        let tty = policy == TtyPolicy::Interactive;
        Self {
            target,
            command,
            stdin: true,
            stdout: true,
            stderr: !tty,
            tty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ExecTarget {
        ExecTarget {
            namespace: "default".into(),
            pod: "mongo-0".into(),
            container: Some("mongo".into()),
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(target().to_string(), "default/mongo-0:mongo");
        let bare = ExecTarget {
            container: None,
            ..target()
        };
        assert_eq!(bare.to_string(), "default/mongo-0");
    }

    #[test]
    fn test_tty_policy_flags() {
        let interactive = ExecRequest::new(target(), vec!["sh".into()], TtyPolicy::Interactive);
        assert!(interactive.stdin && interactive.stdout && interactive.tty);
        assert!(!interactive.stderr);

        let pipes = ExecRequest::new(target(), vec!["sh".into()], TtyPolicy::Pipes);
        assert!(pipes.stdin && pipes.stdout && pipes.stderr);
        assert!(!pipes.tty);
    }
}
