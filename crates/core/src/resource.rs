//! Rendered Kubernetes resources and the multi-document YAML splitter.
//!
//! A [`Resource`] keeps the exact text of one YAML document next to its
//! decoded mapping. Accessors never fail: missing or mistyped fields fall
//! back to defaults so partially-formed generator output stays browsable.

use std::fmt;

use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::error::DecodeError;

/// Placeholder name reported for resources without `metadata.name`.
pub const EMPTY_NAME: &str = "<empty>";

const DOCUMENT_START: &str = "---\n";
const DOCUMENT_END: &str = "\n---";
const SEPARATOR: &str = "\n---\n";

/// One decoded YAML document plus its original text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    /// Document text as emitted by the generator (between separators).
    pub yaml: String,
    /// Generic decoded mapping.
    pub object: Mapping,
}

impl Resource {
    pub fn api_version(&self) -> &str {
        self.top_str("apiVersion").unwrap_or_default()
    }

    pub fn kind(&self) -> &str {
        self.top_str("kind").unwrap_or_default()
    }

    /// `metadata.namespace`, `""` for cluster-scoped or unset.
    pub fn namespace(&self) -> &str {
        self.metadata_str("namespace").unwrap_or_default()
    }

    /// `metadata.name`, [`EMPTY_NAME`] when unset or blank.
    pub fn name(&self) -> &str {
        self.metadata_str("name")
            .filter(|name| !name.is_empty())
            .unwrap_or(EMPTY_NAME)
    }

    /// API group parsed from `apiVersion` (`""` for the core group).
    pub fn group(&self) -> &str {
        match self.api_version().split_once('/') {
            Some((group, _)) => group,
            None => "",
        }
    }

    pub fn group_kind(&self) -> GroupKind<'_> {
        GroupKind {
            group: self.group(),
            kind: self.kind(),
        }
    }

    /// `namespace/name`, or just `name` for cluster-scoped resources.
    pub fn namespaced_name(&self) -> String {
        match self.namespace() {
            "" => self.name().to_string(),
            ns => format!("{}/{}", ns, self.name()),
        }
    }

    /// Identity used for lookups.
    pub fn key(&self) -> ResourceKey {
        ResourceKey {
            api_version: self.api_version().to_string(),
            kind: self.kind().to_string(),
            namespace: self.namespace().to_string(),
            name: self.name().to_string(),
        }
    }

    /// Exact, case-sensitive identity comparison.
    pub fn matches(&self, key: &ResourceKey) -> bool {
        self.api_version() == key.api_version
            && self.kind() == key.kind
            && self.namespace() == key.namespace
            && self.name() == key.name
    }

    fn top_str(&self, field: &str) -> Option<&str> {
        self.object.get(field).and_then(Value::as_str)
    }

    fn metadata_str(&self, field: &str) -> Option<&str> {
        self.object
            .get("metadata")
            .and_then(Value::as_mapping)
            .and_then(|m| m.get(field))
            .and_then(Value::as_str)
    }
}

/// Group + kind pair, rendered as `Kind.group` (or `Kind` for the core group).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupKind<'a> {
    pub group: &'a str,
    pub kind: &'a str,
}

impl fmt::Display for GroupKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}.{}", self.kind, self.group)
        }
    }
}

/// Lookup key: apiVersion + kind + namespace (`""` if cluster-scoped) + name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceKey {
    pub api_version: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

/// Find the first resource whose identity equals `key`.
pub fn find_resource<'a>(resources: &'a [Resource], key: &ResourceKey) -> Option<&'a Resource> {
    resources.iter().find(|r| r.matches(key))
}

// ── Splitting ───────────────────────────────────────────────────────

/// Split a multi-document YAML stream into resources.
///
/// One leading `---\n` and one trailing `\n---` are trimmed, then the text is
/// split on `\n---\n`. Empty and `null` documents are skipped. On the first
/// document that fails to decode, the resources decoded so far are returned
/// together with the error.
pub fn split_yaml(data: &[u8]) -> (Vec<Resource>, Option<DecodeError>) {
    let mut resources = Vec::new();

    let text = match std::str::from_utf8(data) {
        Ok(t) => t,
        Err(e) => return (resources, Some(e.into())),
    };
    let text = text.strip_prefix(DOCUMENT_START).unwrap_or(text);
    let text = text.strip_suffix(DOCUMENT_END).unwrap_or(text);

    for (index, chunk) in text.split(SEPARATOR).enumerate() {
        let trimmed = chunk.trim();
        if trimmed.is_empty() || trimmed == "null" {
            continue;
        }

        match serde_yaml::from_str::<Value>(trimmed) {
            Ok(Value::Mapping(object)) => resources.push(Resource {
                yaml: chunk.to_string(),
                object,
            }),
            // Comment-only documents decode to null.
            Ok(Value::Null) => continue,
            Ok(_) => return (resources, Some(DecodeError::NotAMapping { index })),
            Err(source) => return (resources, Some(DecodeError::Yaml { index, source })),
        }
    }

    (resources, None)
}
