//! Per-path command runner.
//!
//! A [`CommandRunner`] binds a target path to a profile (chosen by rules or
//! given explicitly), runs it on demand or on filesystem changes, and
//! broadcasts [`CommandEvent`](crate::CommandEvent)s to subscribers. A new
//! run cancels the one in flight.

mod core;
mod watcher;

#[cfg(test)]
mod tests;

pub use self::core::CommandRunner;
