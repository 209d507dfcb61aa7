//! Generator selection for kat.
//!
//! This crate provides:
//! - A sandboxed expression environment (`files`, `dir`, path and YAML helpers)
//! - [`Rule`]: boolean predicate over a file set naming a profile
//! - [`Profile`]: command template with hooks and an optional file selector
//! - [`RuleSet`]: the YAML configuration document and its resolution

pub mod error;
pub mod expr;
pub mod hooks;
pub mod profile;
pub mod rule;
pub mod ruleset;

pub use error::{Result, RuleError};
pub use hooks::{EnvVar, HookCommand, HookPhase, Hooks};
pub use profile::Profile;
pub use rule::{select_rule, ResolvedRule, Rule};
pub use ruleset::{ResolvedRuleSet, RuleSet};
