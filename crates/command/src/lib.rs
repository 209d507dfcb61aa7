//! Execution engine for kat.
//!
//! This crate provides:
//! - [`CancelToken`]: hierarchical cooperative cancellation
//! - Bounded child-process execution and the hook pipeline
//! - [`ProfileExec`]: pre-render hooks, main command, decode, post-render hooks
//! - [`CommandRunner`]: per-path state machine with watcher and event fan-out

pub mod cancel;
pub mod error;
pub mod event;
pub mod exec;
pub mod hooks;
pub mod render;
pub mod runner;

pub use cancel::CancelToken;
pub use error::{CommandError, Result};
pub use event::{CommandEvent, CommandOutput};
pub use exec::Truncation;
pub use render::ProfileExec;
pub use runner::CommandRunner;
