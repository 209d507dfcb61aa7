//! [`Rule`] and [`ResolvedRule`]: predicates selecting a profile for a file set.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RuleError};
use crate::expr::Program;
use crate::profile::Profile;

/// A match expression plus the name of the profile it selects.
///
/// Unresolved: holds only the profile name. See [`ResolvedRule`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    #[serde(rename = "match")]
    pub matches: String,
    pub profile: String,
    #[serde(skip)]
    program: OnceLock<Program>,
}

impl Rule {
    pub fn new(matches: impl Into<String>, profile: impl Into<String>) -> Self {
        Self {
            matches: matches.into(),
            profile: profile.into(),
            program: OnceLock::new(),
        }
    }

    /// Compile the match expression as a boolean program. Idempotent.
    pub fn compile(&self) -> Result<()> {
        if self.program.get().is_some() {
            return Ok(());
        }
        let program = Program::compile_bool(&self.matches).map_err(|e| RuleError::Compile {
            owner: format!("rule for profile '{}' ({})", self.profile, self.matches),
            source: e,
        })?;
        let _ = self.program.set(program);
        Ok(())
    }

    /// Evaluate against a file set, compiling on first use. A rule that
    /// does not compile never matches.
    pub fn evaluate(&self, dir: &str, files: &[String]) -> bool {
        if let Err(e) = self.compile() {
            tracing::warn!(error = %e, "skipping rule");
            return false;
        }
        self.program
            .get()
            .is_some_and(|program| program.eval_bool(dir, files))
    }

    /// Compile and bind to `profile`.
    pub fn resolve(self, profile: Arc<Profile>) -> Result<ResolvedRule> {
        self.compile()?;
        Ok(ResolvedRule {
            rule: Arc::new(self),
            profile,
        })
    }
}

/// A compiled rule bound to its profile. The only form a runner accepts.
#[derive(Debug, Clone)]
pub struct ResolvedRule {
    rule: Arc<Rule>,
    profile: Arc<Profile>,
}

impl ResolvedRule {
    /// Rule that always selects `profile`, used for explicit profile choice.
    pub fn for_profile(name: &str, profile: Arc<Profile>) -> Result<Self> {
        profile.compile(name)?;
        Rule::new("true", name).resolve(profile)
    }

    pub fn profile_name(&self) -> &str {
        &self.rule.profile
    }

    pub fn profile(&self) -> &Arc<Profile> {
        &self.profile
    }

    pub fn expression(&self) -> &str {
        &self.rule.matches
    }

    pub fn evaluate(&self, dir: &str, files: &[String]) -> bool {
        self.rule.evaluate(dir, files)
    }
}

/// First rule, in declared order, whose expression holds for the file set.
pub fn select_rule<'a>(
    rules: &'a [ResolvedRule],
    dir: &Path,
    files: &[String],
) -> Option<&'a ResolvedRule> {
    let dir = dir.to_string_lossy();
    rules.iter().find(|rule| rule.evaluate(&dir, files))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(command: &str) -> Arc<Profile> {
        Arc::new(Profile::new(command, Vec::<String>::new()))
    }

    #[test]
    fn deserializes_match_key() {
        let rule: Rule = serde_yaml::from_str("match: size(files) > 0\nprofile: yaml\n").unwrap();
        assert_eq!(rule.matches, "size(files) > 0");
        assert_eq!(rule.profile, "yaml");
    }

    #[test]
    fn compile_error_names_rule() {
        let err = Rule::new("files", "ks").compile().unwrap_err();
        assert!(matches!(err, RuleError::Compile { ref owner, .. } if owner.contains("'ks'")));
    }

    #[test]
    fn lowest_index_match_wins() {
        let rules = vec![
            Rule::new("size(files) > 5", "a").resolve(profile("a")).unwrap(),
            Rule::new("size(files) > 0", "b").resolve(profile("b")).unwrap(),
            Rule::new("true", "c").resolve(profile("c")).unwrap(),
        ];
        let files = vec!["/d/x".to_string()];
        let selected = select_rule(&rules, Path::new("/d"), &files).unwrap();
        assert_eq!(selected.profile_name(), "b");
        assert_eq!(select_rule(&rules, Path::new("/d"), &[]).unwrap().profile_name(), "c");
    }

    #[test]
    fn no_match_is_none() {
        let rules = vec![Rule::new("false", "a").resolve(profile("a")).unwrap()];
        assert!(select_rule(&rules, Path::new("/d"), &[]).is_none());
    }

    #[test]
    fn for_profile_always_matches() {
        let rule = ResolvedRule::for_profile("cat", profile("cat")).unwrap();
        assert!(rule.evaluate("/anywhere", &[]));
        assert_eq!(rule.profile().command, "cat");
    }

    #[test]
    fn for_profile_rejects_empty_command() {
        assert!(matches!(
            ResolvedRule::for_profile("blank", profile("")),
            Err(RuleError::EmptyCommand(_))
        ));
    }
}
