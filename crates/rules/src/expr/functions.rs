//! Built-in functions and methods.
//!
//! Path helpers follow slash-separated semantics regardless of platform.
//! `yamlPath` never fails: any read, parse or lookup problem yields `null`.

use std::fs;
use std::path::Path;

use regex::Regex;
use tracing::debug;

use super::check::Type;
use super::error::{EvalError, EvalResult};
use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Function {
    PathBase,
    PathDir,
    PathExt,
    YamlPath,
    Size,
}

impl Function {
    pub(crate) fn lookup(name: &str) -> Option<Self> {
        match name {
            "pathBase" => Some(Function::PathBase),
            "pathDir" => Some(Function::PathDir),
            "pathExt" => Some(Function::PathExt),
            "yamlPath" => Some(Function::YamlPath),
            "size" => Some(Function::Size),
            _ => None,
        }
    }

    pub(crate) fn arity(self) -> usize {
        match self {
            Function::YamlPath => 2,
            _ => 1,
        }
    }

    pub(crate) fn check(self, args: &[Type]) -> Result<Type, String> {
        match self {
            Function::PathBase | Function::PathDir | Function::PathExt => {
                expect_string(self, args)?;
                Ok(Type::String)
            }
            Function::YamlPath => {
                expect_string(self, args)?;
                Ok(Type::Dyn)
            }
            Function::Size => match args.first() {
                Some(Type::String | Type::List | Type::Map | Type::Dyn) => Ok(Type::Int),
                other => Err(format!("size() not applicable to {:?}", other)),
            },
        }
    }

    pub(crate) fn call(self, args: &[Value], dir: &str) -> EvalResult<Value> {
        match (self, args) {
            (Function::PathBase, [Value::String(p)]) => Ok(Value::String(path_base(p))),
            (Function::PathDir, [Value::String(p)]) => Ok(Value::String(path_dir(p))),
            (Function::PathExt, [Value::String(p)]) => Ok(Value::String(path_ext(p).to_string())),
            (Function::YamlPath, [Value::String(p), Value::String(q)]) => Ok(yaml_path(dir, p, q)),
            (Function::Size, [v]) => size(v),
            _ => Err(EvalError::new(format!(
                "no matching overload for {:?} with arguments ({})",
                self,
                args.iter().map(Value::type_name).collect::<Vec<_>>().join(", ")
            ))),
        }
    }
}

fn expect_string(f: Function, args: &[Type]) -> Result<(), String> {
    match args.iter().find(|t| !t.is_string_like()) {
        Some(t) => Err(format!("{:?} expects string arguments, found {:?}", f, t)),
        None => Ok(()),
    }
}

impl Type {
    fn is_string_like(self) -> bool {
        matches!(self, Type::String | Type::Dyn)
    }
}

fn size(value: &Value) -> EvalResult<Value> {
    let n = match value {
        Value::String(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        other => return Err(EvalError::new(format!("size() not applicable to {}", other.type_name()))),
    };
    Ok(Value::Int(i64::try_from(n).unwrap_or(i64::MAX)))
}

// ── Methods ─────────────────────────────────────────────────────────

pub(crate) fn check_method(method: &str, target: Type, args: &[Type]) -> Result<Type, String> {
    let arity = |n: usize| {
        if args.len() == n {
            Ok(())
        } else {
            Err(format!("method '{}' expects {} argument(s), got {}", method, n, args.len()))
        }
    };
    match method {
        "startsWith" | "endsWith" | "contains" | "matches" => {
            arity(1)?;
            if !target.is_string_like() || !args.iter().all(|a| a.is_string_like()) {
                return Err(format!("method '{}' applies to strings, found {:?}", method, target));
            }
            Ok(Type::Bool)
        }
        "size" => {
            arity(0)?;
            Function::Size.check(&[target])
        }
        other => Err(format!("undeclared method '{}'", other)),
    }
}

pub(crate) fn call_method(method: &str, target: &Value, args: &[Value]) -> EvalResult<Value> {
    match (method, target, args) {
        ("startsWith", Value::String(s), [Value::String(p)]) => Ok(Value::Bool(s.starts_with(p.as_str()))),
        ("endsWith", Value::String(s), [Value::String(p)]) => Ok(Value::Bool(s.ends_with(p.as_str()))),
        ("contains", Value::String(s), [Value::String(p)]) => Ok(Value::Bool(s.contains(p.as_str()))),
        ("matches", Value::String(s), [Value::String(p)]) => {
            let re = Regex::new(p).map_err(|e| EvalError::new(format!("invalid regex: {}", e)))?;
            Ok(Value::Bool(re.is_match(s)))
        }
        ("size", v, []) => size(v),
        _ => Err(EvalError::new(format!(
            "no matching overload for {}.{}()",
            target.type_name(),
            method
        ))),
    }
}

// ── Path helpers ────────────────────────────────────────────────────

/// Last element of a slash-separated path; `"."` for empty, `"/"` for root.
pub fn path_base(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    match trimmed.rfind('/') {
        Some(i) => trimmed[i + 1..].to_string(),
        None => trimmed.to_string(),
    }
}

/// Everything before the last element; `"."` when there is no separator.
pub fn path_dir(path: &str) -> String {
    match path.rfind('/') {
        None => ".".to_string(),
        Some(i) => {
            let dir = path[..i].trim_end_matches('/');
            if dir.is_empty() {
                "/".to_string()
            } else {
                dir.to_string()
            }
        }
    }
}

/// Suffix from the final dot of the last element (`".yaml"`), or `""`.
pub fn path_ext(path: &str) -> &str {
    for (i, c) in path.char_indices().rev() {
        match c {
            '/' => return "",
            '.' => return &path[i..],
            _ => {}
        }
    }
    ""
}

// ── YAML queries ────────────────────────────────────────────────────

/// Read `path` (relative paths resolve against `dir`), parse it as YAML and
/// extract `query`. Returns `null` on any failure.
pub fn yaml_path(dir: &str, path: &str, query: &str) -> Value {
    let full = if Path::new(path).is_absolute() {
        Path::new(path).to_path_buf()
    } else {
        Path::new(dir).join(path)
    };

    let contents = match fs::read_to_string(&full) {
        Ok(c) => c,
        Err(e) => {
            debug!(path = %full.display(), error = %e, "yamlPath: cannot read file");
            return Value::Null;
        }
    };
    let document: serde_yaml::Value = match serde_yaml::from_str(&contents) {
        Ok(d) => d,
        Err(e) => {
            debug!(path = %full.display(), error = %e, "yamlPath: cannot parse file");
            return Value::Null;
        }
    };
    let Some(segments) = parse_query(query) else {
        debug!(query, "yamlPath: invalid query");
        return Value::Null;
    };

    let mut current = &document;
    for segment in &segments {
        let next = match (segment, current) {
            (Segment::Key(key), serde_yaml::Value::Mapping(map)) => map.get(key.as_str()),
            (Segment::Index(i), serde_yaml::Value::Sequence(items)) => items.get(*i),
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return Value::Null,
        }
    }
    Value::from(current)
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Parse `$.a.b[0]['c.d']`. The leading `$` is optional.
fn parse_query(query: &str) -> Option<Vec<Segment>> {
    let query = query.trim();
    let mut rest = query.strip_prefix('$').unwrap_or(query);
    let mut segments = Vec::new();

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('.') {
            let end = after.find(['.', '[']).unwrap_or(after.len());
            let key = &after[..end];
            if key.is_empty() {
                return None;
            }
            segments.push(Segment::Key(key.to_string()));
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let end = after.find(']')?;
            let inner = after[..end].trim();
            let quoted = inner
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')));
            match quoted {
                Some(key) => segments.push(Segment::Key(key.to_string())),
                None => segments.push(Segment::Index(inner.parse().ok()?)),
            }
            rest = &after[end + 1..];
        } else {
            return None;
        }
    }
    Some(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn path_base_cases() {
        assert_eq!(path_base("/a/b/Chart.yaml"), "Chart.yaml");
        assert_eq!(path_base("dir/"), "dir");
        assert_eq!(path_base("/"), "/");
        assert_eq!(path_base(""), ".");
        assert_eq!(path_base("plain"), "plain");
    }

    #[test]
    fn path_dir_cases() {
        assert_eq!(path_dir("/a/b/Chart.yaml"), "/a/b");
        assert_eq!(path_dir("/Chart.yaml"), "/");
        assert_eq!(path_dir("Chart.yaml"), ".");
    }

    #[test]
    fn path_ext_cases() {
        assert_eq!(path_ext("/a/values.yaml"), ".yaml");
        assert_eq!(path_ext("/a.d/Makefile"), "");
        assert_eq!(path_ext("archive.tar.gz"), ".gz");
        assert_eq!(path_ext(".hidden"), ".hidden");
    }

    #[test]
    fn parses_queries() {
        assert_eq!(
            parse_query("$.spec.items[1]['app.kubernetes.io/name']"),
            Some(vec![
                Segment::Key("spec".into()),
                Segment::Key("items".into()),
                Segment::Index(1),
                Segment::Key("app.kubernetes.io/name".into()),
            ])
        );
        assert_eq!(parse_query(".name"), Some(vec![Segment::Key("name".into())]));
        assert_eq!(parse_query("$"), Some(vec![]));
        assert_eq!(parse_query("$..x"), None);
        assert_eq!(parse_query("$[x]"), None);
    }

    #[test]
    fn yaml_path_reads_values() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Chart.yaml"),
            "apiVersion: v2\nname: demo\ndependencies:\n  - name: redis\n",
        )
        .unwrap();
        let d = dir.path().to_string_lossy();

        assert_eq!(yaml_path(&d, "Chart.yaml", "$.apiVersion"), Value::String("v2".into()));
        assert_eq!(
            yaml_path(&d, "Chart.yaml", "$.dependencies[0].name"),
            Value::String("redis".into())
        );
    }

    #[test]
    fn yaml_path_failures_are_null() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.yaml"), "a: [unclosed").unwrap();
        fs::write(dir.path().join("ok.yaml"), "a: 1").unwrap();
        let d = dir.path().to_string_lossy();

        assert_eq!(yaml_path(&d, "missing.yaml", "$.a"), Value::Null);
        assert_eq!(yaml_path(&d, "bad.yaml", "$.a"), Value::Null);
        assert_eq!(yaml_path(&d, "ok.yaml", "$.b"), Value::Null);
        assert_eq!(yaml_path(&d, "ok.yaml", "$.a[0]"), Value::Null);
    }
}
