//! Sandboxed expression environment used by rules and profiles.
//!
//! Expressions see two variables, `files` (list of path strings) and `dir`
//! (string), plus the helper functions `pathBase`, `pathDir`, `pathExt`,
//! `yamlPath` and `size`. The surface is a small CEL subset:
//! `files.exists(f, pathBase(f) in ["Chart.yaml"])`.
//!
//! Evaluation fails closed. A boolean program that errors or yields a
//! non-boolean is `false`; a list program that errors or yields a non-list
//! is empty.

mod check;
mod error;
mod eval;
mod functions;
mod lexer;
mod parser;
mod value;


use tracing::debug;

pub use check::Type;
pub use error::{EvalError, ExprError};
pub use functions::{path_base, path_dir, path_ext, yaml_path};
pub use value::Value;

use check::Checker;
use eval::{eval, Activation};
use parser::Expr;

/// A parsed and checked expression, immutable once compiled.
#[derive(Debug, Clone)]
pub struct Program {
    source: String,
    ast: Expr,
    output: Type,
}

impl Program {
    /// Parse and statically check `source`.
    pub fn compile(source: &str) -> Result<Self, ExprError> {
        let ast = parser::parse(source)?;
        let output = Checker::new().check(&ast)?;
        Ok(Self {
            source: source.to_string(),
            ast,
            output,
        })
    }

    /// Compile an expression that must produce a boolean.
    pub fn compile_bool(source: &str) -> Result<Self, ExprError> {
        Self::compile_expecting(source, Type::Bool)
    }

    /// Compile an expression that must produce a list.
    pub fn compile_list(source: &str) -> Result<Self, ExprError> {
        Self::compile_expecting(source, Type::List)
    }

    fn compile_expecting(source: &str, expected: Type) -> Result<Self, ExprError> {
        let program = Self::compile(source)?;
        if program.output != expected && program.output != Type::Dyn {
            return Err(ExprError::Type(format!(
                "expression must evaluate to {:?}, found {:?}",
                expected, program.output
            )));
        }
        Ok(program)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Statically inferred result type.
    pub fn output_type(&self) -> Type {
        self.output
    }

    /// Evaluate to a raw value.
    pub fn eval(&self, dir: &str, files: &[String]) -> Result<Value, EvalError> {
        eval(&self.ast, &mut Activation::new(dir, files))
    }

    /// Evaluate in boolean context: errors and non-booleans are `false`.
    pub fn eval_bool(&self, dir: &str, files: &[String]) -> bool {
        match self.eval(dir, files) {
            Ok(Value::Bool(b)) => b,
            Ok(other) => {
                debug!(expr = %self.source, result = other.type_name(), "expression did not return bool");
                false
            }
            Err(e) => {
                debug!(expr = %self.source, error = %e, "expression evaluation failed");
                false
            }
        }
    }

    /// Evaluate in list context: errors and non-lists are empty. Non-string
    /// elements are dropped.
    pub fn eval_list(&self, dir: &str, files: &[String]) -> Vec<String> {
        match self.eval(dir, files) {
            Ok(Value::List(items)) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            Ok(other) => {
                debug!(expr = %self.source, result = other.type_name(), "expression did not return list");
                Vec::new()
            }
            Err(e) => {
                debug!(expr = %self.source, error = %e, "expression evaluation failed");
                Vec::new()
            }
        }
    }
}
