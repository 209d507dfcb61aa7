//! [`Profile`]: a named command template for rendering manifests.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RuleError};
use crate::expr::Program;
use crate::hooks::{EnvVar, Hooks};

/// Command template plus optional file-selection expression.
///
/// `source` is a list expression choosing which files belong to the
/// profile (and are watched). Without it every file is selected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Profile {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: Vec<EnvVar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Hooks::is_empty")]
    pub hooks: Hooks,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip)]
    program: OnceLock<Program>,
}

impl Profile {
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: Vec::new(),
            source: None,
            hooks: Hooks::default(),
            theme: None,
            program: OnceLock::new(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self.program = OnceLock::new();
        self
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_env(mut self, env: Vec<EnvVar>) -> Self {
        self.env = env;
        self
    }

    /// Validate the command and compile the source expression.
    ///
    /// Idempotent: a compiled program is kept and reused.
    pub fn compile(&self, name: &str) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(RuleError::EmptyCommand(name.to_string()));
        }
        let Some(source) = &self.source else {
            return Ok(());
        };
        if self.program.get().is_some() {
            return Ok(());
        }
        let program = Program::compile_list(source).map_err(|e| RuleError::Compile {
            owner: format!("profile '{}' source", name),
            source: e,
        })?;
        let _ = self.program.set(program);
        Ok(())
    }

    /// Decide whether the profile applies and which files it selects.
    ///
    /// No source expression selects everything. A source expression that
    /// yields an empty list (or fails) is an explicit non-match.
    pub fn evaluate(&self, dir: &str, files: &[String]) -> (bool, Vec<String>) {
        let Some(source) = &self.source else {
            return (true, files.to_vec());
        };
        let program = match self.program.get() {
            Some(p) => p,
            None => match Program::compile_list(source) {
                Ok(p) => self.program.get_or_init(|| p),
                Err(e) => {
                    tracing::warn!(source = %source, error = %e, "profile source does not compile");
                    return (false, Vec::new());
                }
            },
        };
        let selected = program.eval_list(dir, files);
        (!selected.is_empty(), selected)
    }

    /// `command arg1 arg2 ...` for display.
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files() -> Vec<String> {
        vec!["/w/a.yaml".to_string(), "/w/b.txt".to_string()]
    }

    #[test]
    fn no_source_selects_all() {
        let profile = Profile::new("kustomize", ["build", "."]);
        assert_eq!(profile.evaluate("/w", &files()), (true, files()));
    }

    #[test]
    fn source_filters_files() {
        let profile = Profile::new("cat", Vec::<String>::new())
            .with_source(r#"files.filter(f, pathExt(f) == ".yaml")"#);
        profile.compile("yaml").unwrap();
        assert_eq!(profile.evaluate("/w", &files()), (true, vec!["/w/a.yaml".to_string()]));
    }

    #[test]
    fn empty_selection_is_non_match() {
        let profile = Profile::new("cat", Vec::<String>::new()).with_source("[]");
        profile.compile("none").unwrap();
        assert_eq!(profile.evaluate("/w", &files()), (false, vec![]));
    }

    #[test]
    fn empty_command_fails_compile() {
        let profile = Profile::new("  ", Vec::<String>::new());
        assert!(matches!(profile.compile("blank"), Err(RuleError::EmptyCommand(name)) if name == "blank"));
    }

    #[test]
    fn boolean_source_fails_compile() {
        let profile = Profile::new("cat", Vec::<String>::new()).with_source("size(files) > 0");
        let err = profile.compile("bad").unwrap_err();
        assert!(err.to_string().contains("profile 'bad' source"));
    }

    #[test]
    fn compile_is_idempotent() {
        let profile = Profile::new("cat", Vec::<String>::new()).with_source("files");
        profile.compile("p").unwrap();
        profile.compile("p").unwrap();
        assert_eq!(profile.evaluate("/w", &files()).1.len(), 2);
    }

    #[test]
    fn command_line_joins_args() {
        assert_eq!(Profile::new("helm", ["template", "."]).command_line(), "helm template .");
    }
}
