//! Rule set configuration document.
//!
//! A [`RuleSet`] is the YAML shape users write: name-keyed profiles and an
//! ordered list of rules. [`RuleSet::resolve`] compiles every expression and
//! binds each rule to its profile, producing a [`ResolvedRuleSet`] that
//! runners consume.

mod defaults;


use std::fs;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, RuleError};
use crate::profile::Profile;
use crate::rule::{ResolvedRule, Rule};

/// Profiles plus the rules that select them, as written in YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSet {
    #[serde(default)]
    pub profiles: IndexMap<String, Profile>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// Parse a rule set from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a rule set file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let set = Self::from_yaml(&contents)?;
        info!(
            path = %path.display(),
            profiles = set.profiles.len(),
            rules = set.rules.len(),
            "loaded rule set"
        );
        Ok(set)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Compile every profile and rule, and bind rules to profiles.
    ///
    /// Fails on the first empty command, compile error or dangling profile
    /// reference.
    pub fn resolve(&self) -> Result<ResolvedRuleSet> {
        let mut profiles = IndexMap::with_capacity(self.profiles.len());
        for (name, profile) in &self.profiles {
            profile.compile(name)?;
            profiles.insert(name.clone(), Arc::new(profile.clone()));
        }

        let mut rules = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let profile = profiles
                .get(&rule.profile)
                .cloned()
                .ok_or_else(|| RuleError::UnknownProfile {
                    rule: rule.matches.clone(),
                    profile: rule.profile.clone(),
                })?;
            rules.push(rule.clone().resolve(profile)?);
        }

        debug!(profiles = profiles.len(), rules = rules.len(), "resolved rule set");
        Ok(ResolvedRuleSet { rules, profiles })
    }
}

impl Default for RuleSet {
    /// Built-in profiles for Helm charts, Kustomize overlays and plain YAML.
    fn default() -> Self {
        defaults::rule_set()
    }
}

/// Compiled rules bound to shared profiles.
#[derive(Debug, Clone)]
pub struct ResolvedRuleSet {
    pub rules: Vec<ResolvedRule>,
    pub profiles: IndexMap<String, Arc<Profile>>,
}

impl ResolvedRuleSet {
    pub fn profile(&self, name: &str) -> Option<&Arc<Profile>> {
        self.profiles.get(name)
    }

    /// Rule that always selects the named profile.
    pub fn rule_for_profile(&self, name: &str) -> Option<ResolvedRule> {
        let profile = self.profiles.get(name)?;
        ResolvedRule::for_profile(name, Arc::clone(profile)).ok()
    }

    pub fn profile_names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}
