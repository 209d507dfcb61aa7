//! Error types for expression compilation and evaluation.

/// Errors raised while compiling an expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    /// Lexing or parsing failed at the given byte offset.
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// Static checking failed (undeclared names, arity, operand types).
    #[error("type error: {0}")]
    Type(String),
}

/// Run-time evaluation failure.
///
/// Never surfaced to callers of the `eval_*` entry points: boolean and list
/// evaluation fail closed, and this only appears in debug logs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct EvalError(pub String);

impl EvalError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub(crate) type EvalResult<T> = std::result::Result<T, EvalError>;
