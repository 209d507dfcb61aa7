//! Built-in profiles and rules.

use indexmap::IndexMap;

use crate::profile::Profile;
use crate::rule::Rule;

use super::RuleSet;

const YAML_FILES: &str = r#"files.filter(f, pathExt(f) in [".yaml", ".yml"])"#;

const CAT_YAML: &str =
    r#"for f in *.yaml *.yml; do [ -f "$f" ] || continue; echo "---"; cat "$f"; echo; done"#;

pub(super) fn rule_set() -> RuleSet {
    let mut profiles = IndexMap::new();
    profiles.insert(
        "helm".to_string(),
        Profile::new("helm", ["template", ".", "--generate-name"])
            .with_source(r#"files.filter(f, pathExt(f) in [".yaml", ".yml", ".tpl"])"#),
    );
    profiles.insert(
        "kustomize".to_string(),
        Profile::new("kustomize", ["build", "."]).with_source(YAML_FILES),
    );
    profiles.insert(
        "yaml".to_string(),
        Profile::new("sh", ["-c", CAT_YAML]).with_source(YAML_FILES),
    );

    let rules = vec![
        Rule::new(
            r#"files.exists(f, pathBase(f) in ["Chart.yaml", "Chart.yml"])"#,
            "helm",
        ),
        Rule::new(
            r#"files.exists(f, pathBase(f) in ["kustomization.yaml", "kustomization.yml"])"#,
            "kustomize",
        ),
        Rule::new(r#"files.exists(f, pathExt(f) in [".yaml", ".yml"])"#, "yaml"),
    ];

    RuleSet { profiles, rules }
}
