//! Error types for command execution.

use std::path::PathBuf;

use kat_core::DecodeError;
use kat_rules::{HookPhase, RuleError};

/// Errors raised while resolving, running or watching a target.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// No rule matched the target's file set.
    #[error("no command for path: {}", .0.display())]
    NoCommandForPath(PathBuf),

    #[error("empty command")]
    EmptyCommand,

    /// The child process could not be started.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The child process exited unsuccessfully. `exit_code` is -1 when
    /// terminated by a signal.
    #[error("'{command}' exited with code {exit_code}: {stderr}")]
    Execution {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// A hook failed. The phase decides how fatal it is.
    #[error("{phase} hook '{command}' failed: {source}")]
    Hook {
        phase: HookPhase,
        command: String,
        #[source]
        source: Box<CommandError>,
    },

    #[error("failed to decode output: {0}")]
    Decode(#[from] DecodeError),

    #[error("target does not exist: {}", .0.display())]
    TargetMissing(PathBuf),

    /// The run was superseded or closed.
    #[error("context canceled")]
    Canceled,

    #[error("rule error: {0}")]
    Rule(#[from] RuleError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
}

impl CommandError {
    /// True only for a bare cancellation, never for a wrapped one.
    pub fn is_canceled(&self) -> bool {
        matches!(self, CommandError::Canceled)
    }
}

/// Result alias for command operations.
pub type Result<T> = std::result::Result<T, CommandError>;
