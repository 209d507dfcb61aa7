//! Error types for rule and profile configuration.

use crate::expr::ExprError;

/// Errors that can occur while loading, compiling or resolving rules and profiles.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse/deserialization error.
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// An expression failed to compile. `owner` names the rule or profile.
    #[error("failed to compile {owner}: {source}")]
    Compile {
        owner: String,
        #[source]
        source: ExprError,
    },

    /// A rule names a profile that does not exist.
    #[error("rule '{rule}' references unknown profile '{profile}'")]
    UnknownProfile { rule: String, profile: String },

    /// A profile has no command to run.
    #[error("profile '{0}' has an empty command")]
    EmptyCommand(String),
}

/// Result alias for rule operations.
pub type Result<T> = std::result::Result<T, RuleError>;
