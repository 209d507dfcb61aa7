//! Hook definitions: auxiliary commands around a profile's main command.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Environment variable passed to a spawned command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvVar {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A single hook invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookCommand {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: Vec<EnvVar>,
}

impl HookCommand {
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: Vec::new(),
        }
    }
}

impl fmt::Display for HookCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Points in a profile's lifecycle where hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookPhase {
    /// Once, when a runner binds the profile.
    Init,
    /// Before every main command run.
    PreRender,
    /// After every successful main command run, fed its stdout.
    PostRender,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPhase::Init => write!(f, "init"),
            HookPhase::PreRender => write!(f, "preRender"),
            HookPhase::PostRender => write!(f, "postRender"),
        }
    }
}

/// Ordered hook lists per phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Hooks {
    #[serde(default)]
    pub init: Vec<HookCommand>,
    #[serde(default)]
    pub pre_render: Vec<HookCommand>,
    #[serde(default)]
    pub post_render: Vec<HookCommand>,
}

impl Hooks {
    pub fn phase(&self, phase: HookPhase) -> &[HookCommand] {
        match phase {
            HookPhase::Init => &self.init,
            HookPhase::PreRender => &self.pre_render,
            HookPhase::PostRender => &self.post_render,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.init.is_empty() && self.pre_render.is_empty() && self.post_render.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_phases() {
        let hooks: Hooks = serde_yaml::from_str(
            "init:\n  - command: helm\n    args: [version]\npreRender:\n  - command: helm\n    args: [dependency, build]\n",
        )
        .unwrap();
        assert_eq!(hooks.phase(HookPhase::Init).len(), 1);
        assert_eq!(hooks.phase(HookPhase::PreRender)[0].to_string(), "helm dependency build");
        assert!(hooks.phase(HookPhase::PostRender).is_empty());
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(serde_yaml::from_str::<Hooks>("preBuild: []").is_err());
    }
}
