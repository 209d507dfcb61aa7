//! Lifecycle events and per-run output.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kat_core::Resource;
use kat_rules::HookCommand;

use crate::error::CommandError;
use crate::exec::Truncation;

/// Events broadcast by a [`CommandRunner`](crate::CommandRunner).
#[derive(Debug, Clone)]
pub enum CommandEvent {
    /// A run began.
    Start,
    /// A run finished, successfully or not.
    End(CommandOutput),
    /// A run was superseded.
    Cancel,
}

/// Result of one profile execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub error: Option<Arc<CommandError>>,
    pub stdout: String,
    pub stderr: String,
    pub resources: Vec<Resource>,
    /// Post-render hooks configured for the run (informational).
    pub post_render_hooks: Vec<HookCommand>,
    pub truncation: Truncation,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CommandOutput {
    pub(crate) fn started(post_render_hooks: Vec<HookCommand>) -> Self {
        let now = Utc::now();
        Self {
            error: None,
            stdout: String::new(),
            stderr: String::new(),
            resources: Vec::new(),
            post_render_hooks,
            truncation: Truncation::default(),
            started_at: now,
            finished_at: now,
        }
    }

    /// Failed output with no execution behind it.
    pub(crate) fn failed(error: CommandError) -> Self {
        let mut output = Self::started(Vec::new());
        output.error = Some(Arc::new(error));
        output
    }

    pub(crate) fn finish(mut self, result: Result<(), CommandError>) -> Self {
        self.error = result.err().map(Arc::new);
        self.finished_at = Utc::now();
        self
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_canceled(&self) -> bool {
        self.error.as_deref().is_some_and(CommandError::is_canceled)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
