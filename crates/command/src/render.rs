//! [`ProfileExec`]: executing a profile against a directory.

use std::path::Path;

use async_trait::async_trait;
use kat_core::split_yaml;
use kat_rules::{HookPhase, Profile};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::event::CommandOutput;
use crate::exec::{self, Invocation};
use crate::hooks::run_hooks;

/// Render manifests with a profile.
#[async_trait]
pub trait ProfileExec {
    /// Pre-render hooks, main command in `dir`, decode stdout, post-render
    /// hooks fed the raw stdout.
    ///
    /// Failures land in [`CommandOutput::error`]. Resources decoded before a
    /// post-render failure (or a partial decode) stay attached.
    async fn exec(&self, dir: &Path, limit: usize, cancel: &CancelToken) -> CommandOutput;
}

#[async_trait]
impl ProfileExec for Profile {
    async fn exec(&self, dir: &Path, limit: usize, cancel: &CancelToken) -> CommandOutput {
        let mut output = CommandOutput::started(self.hooks.post_render.clone());
        let result = render(self, dir, limit, cancel, &mut output).await;
        output.finish(result)
    }
}

async fn render(
    profile: &Profile,
    dir: &Path,
    limit: usize,
    cancel: &CancelToken,
    output: &mut CommandOutput,
) -> Result<()> {
    let pre = run_hooks(HookPhase::PreRender, &profile.hooks.pre_render, dir, None, limit, cancel).await?;
    output.truncation.add(pre);

    let inv = Invocation {
        command: &profile.command,
        args: &profile.args,
        env: &profile.env,
        dir,
        stdin: None,
        limit,
    };
    let captured = exec::run(inv, cancel).await?;
    output.stdout = String::from_utf8_lossy(&captured.stdout).into_owned();
    output.stderr = captured.stderr_lossy();
    output.truncation.add(captured.truncation);
    let captured = captured.check(profile.command_line())?;

    let (resources, decode_error) = split_yaml(&captured.stdout);
    debug!(command = %profile.command_line(), resources = resources.len(), "decoded output");
    output.resources = resources;
    if let Some(e) = decode_error {
        return Err(e.into());
    }

    let post = run_hooks(
        HookPhase::PostRender,
        &profile.hooks.post_render,
        dir,
        Some(&captured.stdout),
        limit,
        cancel,
    )
    .await?;
    output.truncation.add(post);
    Ok(())
}

#[cfg(test)]
mod tests {
    use kat_rules::{HookCommand, Hooks};
    use tempfile::TempDir;

    use super::*;
    use crate::error::CommandError;

    const MANIFESTS: &str = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n---\napiVersion: v1\nkind: Secret\nmetadata:\n  name: b\n";

    fn sh(script: &str) -> Profile {
        Profile::new("sh", ["-c", script])
    }

    fn hook(script: &str) -> HookCommand {
        HookCommand::new("sh", ["-c", script])
    }

    async fn exec(profile: &Profile, dir: &TempDir) -> CommandOutput {
        profile.exec(dir.path(), 1 << 20, &CancelToken::new()).await
    }

    #[tokio::test]
    async fn decodes_resources() {
        let dir = TempDir::new().unwrap();
        let output = exec(&sh(&format!("printf '{}'", MANIFESTS)), &dir).await;
        assert!(output.is_ok(), "{:?}", output.error);
        let names: Vec<_> = output.resources.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(output.finished_at >= output.started_at);
    }

    #[tokio::test]
    async fn failing_pre_render_never_spawns_main_command() {
        let dir = TempDir::new().unwrap();
        let profile = sh("touch spawned; echo 'kind: A'").with_hooks(Hooks {
            pre_render: vec![hook("exit 1"), hook("touch second-hook")],
            ..Hooks::default()
        });
        let output = exec(&profile, &dir).await;
        assert!(matches!(
            output.error.as_deref(),
            Some(CommandError::Hook { phase: HookPhase::PreRender, .. })
        ));
        assert!(!dir.path().join("spawned").exists());
        assert!(!dir.path().join("second-hook").exists());
        assert!(output.resources.is_empty());
    }

    #[tokio::test]
    async fn failing_post_render_keeps_resources() {
        let dir = TempDir::new().unwrap();
        let profile = sh(&format!("printf '{}'", MANIFESTS)).with_hooks(Hooks {
            post_render: vec![hook("cat > piped; exit 2"), hook("touch skipped")],
            ..Hooks::default()
        });
        let output = exec(&profile, &dir).await;
        assert!(matches!(
            output.error.as_deref(),
            Some(CommandError::Hook { phase: HookPhase::PostRender, .. })
        ));
        assert_eq!(output.resources.len(), 2);
        assert_eq!(output.post_render_hooks.len(), 2);
        assert_eq!(std::fs::read_to_string(dir.path().join("piped")).unwrap(), MANIFESTS);
        assert!(!dir.path().join("skipped").exists());
    }

    #[tokio::test]
    async fn non_zero_exit_has_no_resources() {
        let dir = TempDir::new().unwrap();
        let output = exec(&sh("echo 'kind: A'; echo bad chart >&2; exit 1"), &dir).await;
        match output.error.as_deref() {
            Some(CommandError::Execution { exit_code, stderr, .. }) => {
                assert_eq!(*exit_code, 1);
                assert_eq!(stderr, "bad chart\n");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(output.resources.is_empty());
        assert_eq!(output.stdout, "kind: A\n");
    }

    #[tokio::test]
    async fn decode_failure_reports_partial_resources() {
        let dir = TempDir::new().unwrap();
        let profile = sh("printf 'kind: A\\n---\\n[unclosed\\n'").with_hooks(Hooks {
            post_render: vec![hook("touch post")],
            ..Hooks::default()
        });
        let output = exec(&profile, &dir).await;
        assert!(matches!(output.error.as_deref(), Some(CommandError::Decode(_))));
        assert_eq!(output.resources.len(), 1);
        assert!(!output.stdout.is_empty());
        assert!(!dir.path().join("post").exists());
    }

    #[tokio::test]
    async fn profile_env_reaches_command() {
        let dir = TempDir::new().unwrap();
        let profile = sh("echo \"kind: $KIND\"").with_env(vec![kat_rules::EnvVar::new("KIND", "Pod")]);
        let output = exec(&profile, &dir).await;
        assert_eq!(output.resources[0].kind(), "Pod");
    }
}
