//! Tree-walking interpreter.

use super::error::{EvalError, EvalResult};
use super::functions::{call_method, Function};
use super::parser::{BinaryOp, Expr, Macro, UnaryOp};
use super::value::Value;

/// Variable bindings for one evaluation.
pub(crate) struct Activation<'a> {
    dir: &'a str,
    files: Value,
    locals: Vec<(String, Value)>,
}

impl<'a> Activation<'a> {
    pub(crate) fn new(dir: &'a str, files: &[String]) -> Self {
        Self {
            dir,
            files: Value::List(files.iter().cloned().map(Value::String).collect()),
            locals: Vec::new(),
        }
    }

    fn lookup(&self, name: &str) -> EvalResult<Value> {
        if let Some((_, v)) = self.locals.iter().rev().find(|(n, _)| n == name) {
            return Ok(v.clone());
        }
        match name {
            "files" => Ok(self.files.clone()),
            "dir" => Ok(Value::String(self.dir.to_string())),
            other => Err(EvalError::new(format!("undeclared reference to '{}'", other))),
        }
    }
}

pub(crate) fn eval(expr: &Expr, act: &mut Activation<'_>) -> EvalResult<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Ident(name) => act.lookup(name),
        Expr::List(items) => Ok(Value::List(
            items.iter().map(|e| eval(e, act)).collect::<EvalResult<_>>()?,
        )),
        Expr::Unary { op, operand } => match (op, eval(operand, act)?) {
            (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (UnaryOp::Neg, Value::Int(i)) => i
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| EvalError::new("integer overflow")),
            (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
            (op, v) => Err(EvalError::new(format!("operator {:?} not applicable to {}", op, v.type_name()))),
        },
        Expr::Binary {
            op: BinaryOp::And,
            lhs,
            rhs,
        } => logical(act, lhs, rhs, false),
        Expr::Binary {
            op: BinaryOp::Or,
            lhs,
            rhs,
        } => logical(act, lhs, rhs, true),
        Expr::Binary { op, lhs, rhs } => {
            let l = eval(lhs, act)?;
            let r = eval(rhs, act)?;
            binary(*op, l, r)
        }
        Expr::Ternary {
            cond,
            then,
            otherwise,
        } => match eval(cond, act)? {
            Value::Bool(true) => eval(then, act),
            Value::Bool(false) => eval(otherwise, act),
            other => Err(EvalError::new(format!("ternary condition must be bool, found {}", other.type_name()))),
        },
        Expr::Index { target, index } => {
            let t = eval(target, act)?;
            let i = eval(index, act)?;
            match (&t, &i) {
                (Value::List(items), Value::Int(n)) => usize::try_from(*n)
                    .ok()
                    .and_then(|n| items.get(n))
                    .cloned()
                    .ok_or_else(|| EvalError::new(format!("index {} out of range", n))),
                (Value::Map(map), Value::String(key)) => map
                    .get(key)
                    .cloned()
                    .ok_or_else(|| EvalError::new(format!("no such key: {}", key))),
                _ => Err(EvalError::new(format!(
                    "cannot index {} with {}",
                    t.type_name(),
                    i.type_name()
                ))),
            }
        }
        Expr::Field { target, name } => match eval(target, act)? {
            Value::Map(map) => map
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::new(format!("no such key: {}", name))),
            other => Err(EvalError::new(format!("cannot select field '{}' of {}", name, other.type_name()))),
        },
        Expr::Call { function, args } => {
            let f = Function::lookup(function)
                .ok_or_else(|| EvalError::new(format!("undeclared function '{}'", function)))?;
            let values = args.iter().map(|a| eval(a, act)).collect::<EvalResult<Vec<_>>>()?;
            f.call(&values, act.dir)
        }
        Expr::Method {
            target,
            method,
            args,
        } => {
            let t = eval(target, act)?;
            let values = args.iter().map(|a| eval(a, act)).collect::<EvalResult<Vec<_>>>()?;
            call_method(method, &t, &values)
        }
        Expr::Comprehension {
            kind,
            range,
            var,
            body,
        } => {
            let items = match eval(range, act)? {
                Value::List(items) => items,
                Value::Map(map) => map.into_keys().map(Value::String).collect(),
                other => return Err(EvalError::new(format!("cannot iterate over {}", other.type_name()))),
            };
            comprehension(*kind, items, var, body, act)
        }
    }
}

/// `&&` / `||` with error absorption: a decisive operand wins even if the
/// other side fails.
fn logical(act: &mut Activation<'_>, lhs: &Expr, rhs: &Expr, decisive: bool) -> EvalResult<Value> {
    let l = eval(lhs, act);
    if matches!(l, Ok(Value::Bool(b)) if b == decisive) {
        return Ok(Value::Bool(decisive));
    }
    let r = eval(rhs, act);
    if matches!(r, Ok(Value::Bool(b)) if b == decisive) {
        return Ok(Value::Bool(decisive));
    }
    match (l?, r?) {
        (Value::Bool(_), Value::Bool(_)) => Ok(Value::Bool(!decisive)),
        (a, b) => Err(EvalError::new(format!(
            "logical operator not applicable to {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn comprehension(
    kind: Macro,
    items: Vec<Value>,
    var: &str,
    body: &Expr,
    act: &mut Activation<'_>,
) -> EvalResult<Value> {
    let mut deferred: Option<EvalError> = None;
    let mut matched = 0usize;
    let mut collected = Vec::new();

    for item in items {
        act.locals.push((var.to_string(), item.clone()));
        let result = eval(body, act);
        act.locals.pop();

        match kind {
            Macro::Map => collected.push(result?),
            Macro::Filter => match result? {
                Value::Bool(true) => collected.push(item),
                Value::Bool(false) => {}
                other => return Err(non_bool(kind, &other)),
            },
            Macro::ExistsOne => match result? {
                Value::Bool(true) => matched += 1,
                Value::Bool(false) => {}
                other => return Err(non_bool(kind, &other)),
            },
            Macro::Exists | Macro::All => {
                let decisive = kind == Macro::Exists;
                match result {
                    Ok(Value::Bool(b)) if b == decisive => return Ok(Value::Bool(decisive)),
                    Ok(Value::Bool(_)) => {}
                    Ok(other) => deferred = Some(non_bool(kind, &other)),
                    Err(e) => deferred = Some(e),
                }
            }
        }
    }

    match kind {
        Macro::Map | Macro::Filter => Ok(Value::List(collected)),
        Macro::ExistsOne => Ok(Value::Bool(matched == 1)),
        Macro::Exists | Macro::All => match deferred {
            Some(e) => Err(e),
            None => Ok(Value::Bool(kind == Macro::All)),
        },
    }
}

fn non_bool(kind: Macro, value: &Value) -> EvalError {
    EvalError::new(format!("{:?} predicate returned {}, expected bool", kind, value.type_name()))
}

fn binary(op: BinaryOp, l: Value, r: Value) -> EvalResult<Value> {
    use std::cmp::Ordering;

    let mismatch = |l: &Value, r: &Value| {
        EvalError::new(format!(
            "operator {:?} not applicable to {} and {}",
            op,
            l.type_name(),
            r.type_name()
        ))
    };

    match op {
        BinaryOp::Eq => Ok(Value::Bool(l.equals(&r))),
        BinaryOp::Ne => Ok(Value::Bool(!l.equals(&r))),
        BinaryOp::In => match &r {
            Value::List(items) => Ok(Value::Bool(items.iter().any(|i| i.equals(&l)))),
            Value::Map(map) => match &l {
                Value::String(key) => Ok(Value::Bool(map.contains_key(key))),
                _ => Ok(Value::Bool(false)),
            },
            _ => Err(mismatch(&l, &r)),
        },
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&l, &r) {
                (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
                (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
                (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
                _ => return Err(mismatch(&l, &r)),
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinaryOp::Add => match (l, r) {
            (Value::Int(a), Value::Int(b)) => checked(a.checked_add(b)),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
            (Value::List(mut a), Value::List(b)) => {
                a.extend(b);
                Ok(Value::List(a))
            }
            (l, r) => Err(mismatch(&l, &r)),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => match (&l, &r) {
            (Value::Int(a), Value::Int(b)) => checked(match op {
                BinaryOp::Sub => a.checked_sub(*b),
                BinaryOp::Mul => a.checked_mul(*b),
                BinaryOp::Div => a.checked_div(*b),
                _ => a.checked_rem(*b),
            }),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(match op {
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => a % b,
            })),
            _ => Err(mismatch(&l, &r)),
        },
        BinaryOp::And | BinaryOp::Or => Err(EvalError::new("logical operators are evaluated lazily")),
    }
}

fn checked(result: Option<i64>) -> EvalResult<Value> {
    result
        .map(Value::Int)
        .ok_or_else(|| EvalError::new("integer overflow or division by zero"))
}
