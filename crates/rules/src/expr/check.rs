//! Static checking: resolves names, function arities and coarse result types.
//!
//! Types are tracked only as far as they are knowable without run-time data.
//! Anything read from YAML or indexed out of a collection is `Dyn` and is
//! checked again during evaluation.

use std::collections::HashMap;

use regex::Regex;

use super::error::ExprError;
use super::functions::{self, Function};
use super::parser::{BinaryOp, Expr, Macro, UnaryOp};
use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Null,
    Bool,
    Int,
    Double,
    String,
    List,
    Map,
    Dyn,
}

impl Type {
    fn of(value: &Value) -> Self {
        match value {
            Value::Null => Type::Null,
            Value::Bool(_) => Type::Bool,
            Value::Int(_) => Type::Int,
            Value::Float(_) => Type::Double,
            Value::String(_) => Type::String,
            Value::List(_) => Type::List,
            Value::Map(_) => Type::Map,
        }
    }

    fn is(self, expected: Type) -> bool {
        self == expected || self == Type::Dyn
    }

    fn is_numeric(self) -> bool {
        matches!(self, Type::Int | Type::Double | Type::Dyn)
    }
}

fn type_error(message: String) -> ExprError {
    ExprError::Type(message)
}

/// Checks expressions against the variables bound by the environment.
pub(crate) struct Checker {
    scopes: Vec<HashMap<String, Type>>,
}

impl Checker {
    /// Checker with the standard bindings: `files` (list) and `dir` (string).
    pub(crate) fn new() -> Self {
        let mut globals = HashMap::new();
        globals.insert("files".to_string(), Type::List);
        globals.insert("dir".to_string(), Type::String);
        Self { scopes: vec![globals] }
    }

    fn lookup(&self, name: &str) -> Option<Type> {
        self.scopes.iter().rev().find_map(|s| s.get(name).copied())
    }

    pub(crate) fn check(&mut self, expr: &Expr) -> Result<Type, ExprError> {
        match expr {
            Expr::Literal(value) => Ok(Type::of(value)),
            Expr::Ident(name) => self
                .lookup(name)
                .ok_or_else(|| type_error(format!("undeclared reference to '{}'", name))),
            Expr::List(items) => {
                for item in items {
                    self.check(item)?;
                }
                Ok(Type::List)
            }
            Expr::Unary { op, operand } => {
                let ty = self.check(operand)?;
                match op {
                    UnaryOp::Not if ty.is(Type::Bool) => Ok(Type::Bool),
                    UnaryOp::Neg if ty.is_numeric() => Ok(ty),
                    _ => Err(type_error(format!("operator {:?} not applicable to {:?}", op, ty))),
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let l = self.check(lhs)?;
                let r = self.check(rhs)?;
                check_binary(*op, l, r)
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                let c = self.check(cond)?;
                if !c.is(Type::Bool) {
                    return Err(type_error(format!("ternary condition must be bool, found {:?}", c)));
                }
                let a = self.check(then)?;
                let b = self.check(otherwise)?;
                Ok(if a == b { a } else { Type::Dyn })
            }
            Expr::Index { target, index } => {
                let t = self.check(target)?;
                let i = self.check(index)?;
                match t {
                    Type::List if i.is(Type::Int) => Ok(Type::Dyn),
                    Type::Map if i.is(Type::String) => Ok(Type::Dyn),
                    Type::Dyn => Ok(Type::Dyn),
                    _ => Err(type_error(format!("cannot index {:?} with {:?}", t, i))),
                }
            }
            Expr::Field { target, name } => {
                let t = self.check(target)?;
                if t.is(Type::Map) {
                    Ok(Type::Dyn)
                } else {
                    Err(type_error(format!("cannot select field '{}' of {:?}", name, t)))
                }
            }
            Expr::Call { function, args } => {
                let f = Function::lookup(function)
                    .ok_or_else(|| type_error(format!("undeclared function '{}'", function)))?;
                if args.len() != f.arity() {
                    return Err(type_error(format!(
                        "function '{}' expects {} argument(s), got {}",
                        function,
                        f.arity(),
                        args.len()
                    )));
                }
                let mut arg_types = Vec::with_capacity(args.len());
                for arg in args {
                    arg_types.push(self.check(arg)?);
                }
                f.check(&arg_types).map_err(type_error)
            }
            Expr::Method {
                target,
                method,
                args,
            } => {
                let t = self.check(target)?;
                let mut arg_types = Vec::with_capacity(args.len());
                for arg in args {
                    arg_types.push(self.check(arg)?);
                }
                if method == "matches" {
                    if let Some(Expr::Literal(Value::String(pattern))) = args.first() {
                        Regex::new(pattern).map_err(|e| type_error(format!("invalid regex: {}", e)))?;
                    }
                }
                functions::check_method(method, t, &arg_types).map_err(type_error)
            }
            Expr::Comprehension {
                kind,
                range,
                var,
                body,
            } => {
                let r = self.check(range)?;
                if !matches!(r, Type::List | Type::Map | Type::Dyn) {
                    return Err(type_error(format!("cannot iterate over {:?}", r)));
                }
                let mut scope = HashMap::new();
                scope.insert(var.clone(), Type::Dyn);
                self.scopes.push(scope);
                let body_type = self.check(body);
                self.scopes.pop();
                let body_type = body_type?;

                match kind {
                    Macro::Map => Ok(Type::List),
                    _ if !body_type.is(Type::Bool) => Err(type_error(format!(
                        "{:?} predicate must be bool, found {:?}",
                        kind, body_type
                    ))),
                    Macro::Filter => Ok(Type::List),
                    Macro::Exists | Macro::All | Macro::ExistsOne => Ok(Type::Bool),
                }
            }
        }
    }
}

fn check_binary(op: BinaryOp, l: Type, r: Type) -> Result<Type, ExprError> {
    let mismatch = || type_error(format!("operator {:?} not applicable to {:?} and {:?}", op, l, r));
    match op {
        BinaryOp::And | BinaryOp::Or => {
            if l.is(Type::Bool) && r.is(Type::Bool) {
                Ok(Type::Bool)
            } else {
                Err(mismatch())
            }
        }
        BinaryOp::Eq | BinaryOp::Ne => Ok(Type::Bool),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let comparable = (l.is_numeric() && r.is_numeric())
                || (l.is(Type::String) && r.is(Type::String));
            if comparable {
                Ok(Type::Bool)
            } else {
                Err(mismatch())
            }
        }
        BinaryOp::In => {
            if matches!(r, Type::List | Type::Map | Type::Dyn) {
                Ok(Type::Bool)
            } else {
                Err(mismatch())
            }
        }
        BinaryOp::Add => match (l, r) {
            (Type::Dyn, _) | (_, Type::Dyn) => Ok(Type::Dyn),
            (Type::String, Type::String) => Ok(Type::String),
            (Type::List, Type::List) => Ok(Type::List),
            (Type::Int, Type::Int) => Ok(Type::Int),
            (Type::Double, Type::Double) => Ok(Type::Double),
            _ => Err(mismatch()),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => match (l, r) {
            (Type::Dyn, _) | (_, Type::Dyn) => Ok(Type::Dyn),
            (Type::Int, Type::Int) => Ok(Type::Int),
            (Type::Double, Type::Double) => Ok(Type::Double),
            _ => Err(mismatch()),
        },
    }
}
