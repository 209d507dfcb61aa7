//! Tests for the command runner.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use kat_core::EngineSettings;
use kat_rules::{HookCommand, HookPhase, Hooks, Profile, ResolvedRule, Rule};
use tempfile::TempDir;
use tokio::sync::mpsc;

use super::*;
use crate::cancel::CancelToken;
use crate::error::CommandError;
use crate::event::CommandEvent;

fn sh(script: &str) -> Profile {
    Profile::new("sh", ["-c", script])
}

fn rule(expr: &str, name: &str, profile: Profile) -> ResolvedRule {
    Rule::new(expr, name).resolve(Arc::new(profile)).unwrap()
}

fn layout_rules() -> Vec<ResolvedRule> {
    vec![
        rule(
            r#"files.exists(f, pathBase(f) in ["Chart.yaml"])"#,
            "helm",
            sh("echo 'kind: FromHelm'"),
        ),
        rule(
            r#"files.exists(f, pathExt(f) in [".yaml"])"#,
            "ks",
            sh("echo 'kind: FromKustomize'"),
        ),
    ]
}

fn settings() -> EngineSettings {
    EngineSettings::default().with_output_limit(1 << 20)
}

fn drain(rx: &mut mpsc::Receiver<CommandEvent>) -> Vec<CommandEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn count_ends(events: &[CommandEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, CommandEvent::End(_)))
        .count()
}

// ── Construction ────────────────────────────────────────────────

#[tokio::test]
async fn selects_first_matching_rule() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("Chart.yaml"), "name: demo\n").unwrap();
    fs::write(dir.path().join("values.yaml"), "").unwrap();

    let runner = CommandRunner::with_rules(dir.path(), &layout_rules(), settings())
        .await
        .unwrap();
    assert_eq!(runner.profile_name(), "helm");

    let output = runner.run().await;
    assert!(output.is_ok(), "{:?}", output.error);
    assert_eq!(output.resources[0].kind(), "FromHelm");
}

#[tokio::test]
async fn falls_through_to_later_rule() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("values.yaml"), "").unwrap();

    let runner = CommandRunner::with_rules(dir.path(), &layout_rules(), settings())
        .await
        .unwrap();
    assert_eq!(runner.profile_name(), "ks");
}

#[tokio::test]
async fn no_match_fails_construction() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("README.md"), "").unwrap();

    let err = CommandRunner::with_rules(dir.path(), &layout_rules(), settings())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, CommandError::NoCommandForPath(ref p) if p == dir.path()));
}

#[tokio::test]
async fn nested_files_do_not_drive_selection() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("chart")).unwrap();
    fs::write(dir.path().join("chart/Chart.yaml"), "").unwrap();

    let err = CommandRunner::with_rules(dir.path(), &layout_rules(), settings())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, CommandError::NoCommandForPath(_)));
}

#[tokio::test]
async fn file_target_runs_in_parent_dir() {
    let dir = TempDir::new().unwrap();
    let chart = dir.path().join("Chart.yaml");
    fs::write(&chart, "").unwrap();
    let rules = vec![rule(
        r#"size(files) == 1 && files.all(f, pathDir(f) == dir)"#,
        "single",
        sh("touch ran-here; echo 'kind: A'"),
    )];

    let runner = CommandRunner::with_rules(&chart, &rules, settings()).await.unwrap();
    assert_eq!(runner.profile_name(), "single");
    assert!(runner.run().await.is_ok());
    assert!(dir.path().join("ran-here").exists());
}

#[tokio::test]
async fn missing_target_fails_construction() {
    let dir = TempDir::new().unwrap();
    let err = CommandRunner::with_rules(dir.path().join("nope"), &layout_rules(), settings())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, CommandError::TargetMissing(_)));
}

#[tokio::test]
async fn init_hooks_run_once_at_construction() {
    let dir = TempDir::new().unwrap();
    let profile = sh("echo 'kind: A'").with_hooks(Hooks {
        init: vec![HookCommand::new("sh", ["-c", "echo init >> init.log"])],
        ..Hooks::default()
    });

    let runner = CommandRunner::with_profile(dir.path(), "p", Arc::new(profile), settings())
        .await
        .unwrap();
    runner.run().await;
    runner.run().await;
    assert_eq!(fs::read_to_string(dir.path().join("init.log")).unwrap(), "init\n");
}

#[tokio::test]
async fn init_hook_failure_fails_construction() {
    let dir = TempDir::new().unwrap();
    let profile = sh("echo 'kind: A'").with_hooks(Hooks {
        init: vec![HookCommand::new("sh", ["-c", "exit 9"])],
        ..Hooks::default()
    });

    let err = CommandRunner::with_profile(dir.path(), "p", Arc::new(profile), settings())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, CommandError::Hook { phase: HookPhase::Init, .. }));
}

// ── Runs and events ─────────────────────────────────────────────

#[tokio::test]
async fn run_broadcasts_start_then_end() {
    let dir = TempDir::new().unwrap();
    let runner = CommandRunner::with_profile(dir.path(), "p", Arc::new(sh("echo 'kind: A'")), settings())
        .await
        .unwrap();
    let (tx, mut rx) = mpsc::channel(8);
    runner.subscribe(tx);

    let output = runner.run().await;
    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], CommandEvent::Start));
    match &events[1] {
        CommandEvent::End(end) => assert_eq!(end.resources, output.resources),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn failed_run_still_ends() {
    let dir = TempDir::new().unwrap();
    let runner = CommandRunner::with_profile(dir.path(), "p", Arc::new(sh("exit 1")), settings())
        .await
        .unwrap();
    let (tx, mut rx) = mpsc::channel(8);
    runner.subscribe(tx);

    let output = runner.run().await;
    assert!(matches!(output.error.as_deref(), Some(CommandError::Execution { .. })));
    assert_eq!(count_ends(&drain(&mut rx)), 1);
}

#[tokio::test]
async fn rapid_runs_supersede() {
    let dir = TempDir::new().unwrap();
    let runner = CommandRunner::with_profile(
        dir.path(),
        "slow",
        Arc::new(sh("sleep 1; echo 'kind: A'")),
        settings(),
    )
    .await
    .unwrap();
    let (tx, mut rx) = mpsc::channel(16);
    runner.subscribe(tx);

    let first = {
        let runner = runner.clone();
        tokio::spawn(async move { runner.run().await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    let second = runner.run().await;
    let first = first.await.unwrap();

    assert!(first.is_canceled());
    assert!(second.is_ok(), "{:?}", second.error);

    let events = drain(&mut rx);
    assert_eq!(count_ends(&events), 1);
    assert!(events.iter().any(|e| matches!(e, CommandEvent::Cancel)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn superseded_fast_run_never_ends() {
    let dir = TempDir::new().unwrap();
    let runner = CommandRunner::with_profile(dir.path(), "fast", Arc::new(sh("echo 'kind: A'")), settings())
        .await
        .unwrap();
    let (tx, mut rx) = mpsc::channel(16);
    runner.subscribe(tx);

    for round in 0..200 {
        let first = {
            let runner = runner.clone();
            tokio::spawn(async move { runner.run().await })
        };
        for _ in 0..(round % 4) {
            tokio::task::yield_now().await;
        }
        runner.run().await;
        first.await.unwrap();

        let events = drain(&mut rx);
        let canceled = events.iter().any(|e| matches!(e, CommandEvent::Cancel));
        let expected_ends = if canceled { 1 } else { 2 };
        assert_eq!(count_ends(&events), expected_ends, "round {round}: {events:?}");
    }
}

#[tokio::test]
async fn parent_token_cancels_run() {
    let dir = TempDir::new().unwrap();
    let runner = CommandRunner::with_profile(dir.path(), "p", Arc::new(sh("sleep 10")), settings())
        .await
        .unwrap();
    let parent = CancelToken::new();
    let trigger = parent.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let output = tokio::time::timeout(Duration::from_secs(5), runner.run_with(&parent))
        .await
        .unwrap();
    assert!(output.is_canceled());
}

#[tokio::test]
async fn removed_target_ends_with_error() {
    let root = TempDir::new().unwrap();
    let target = root.path().join("app");
    fs::create_dir_all(&target).unwrap();
    let runner = CommandRunner::with_profile(&target, "p", Arc::new(sh("echo 'kind: A'")), settings())
        .await
        .unwrap();
    let (tx, mut rx) = mpsc::channel(8);
    runner.subscribe(tx);

    fs::remove_dir_all(&target).unwrap();
    let output = runner.run().await;
    assert!(matches!(output.error.as_deref(), Some(CommandError::TargetMissing(_))));
    assert_eq!(count_ends(&drain(&mut rx)), 1);
}

#[tokio::test]
async fn dropped_subscriber_is_pruned() {
    let dir = TempDir::new().unwrap();
    let runner = CommandRunner::with_profile(dir.path(), "p", Arc::new(sh("echo 'kind: A'")), settings())
        .await
        .unwrap();
    let (gone, rx) = mpsc::channel(8);
    drop(rx);
    runner.subscribe(gone);
    let (tx, mut live) = mpsc::channel(8);
    runner.subscribe(tx);

    runner.run().await;
    assert_eq!(count_ends(&drain(&mut live)), 1);
    assert_eq!(runner.subscriber_count(), 1);
}

// ── Profile switching and lifecycle ─────────────────────────────

#[tokio::test]
async fn set_profile_switches_command() {
    let dir = TempDir::new().unwrap();
    let runner = CommandRunner::with_profile(dir.path(), "a", Arc::new(sh("echo 'kind: A'")), settings())
        .await
        .unwrap();

    runner
        .set_profile("b", Arc::new(sh("echo 'kind: B'")))
        .await
        .unwrap();
    assert_eq!(runner.profile_name(), "b");
    assert_eq!(runner.run().await.resources[0].kind(), "B");

    let failing = sh("echo 'kind: C'").with_hooks(Hooks {
        init: vec![HookCommand::new("false", Vec::<String>::new())],
        ..Hooks::default()
    });
    assert!(runner.set_profile("c", Arc::new(failing)).await.is_err());
    assert_eq!(runner.profile_name(), "b");
}

#[tokio::test]
async fn close_stops_watching_and_disconnects() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.yaml"), "kind: A\n").unwrap();
    let runner = CommandRunner::with_profile(dir.path(), "p", Arc::new(sh("cat a.yaml")), settings())
        .await
        .unwrap();
    let (tx, mut rx) = mpsc::channel(8);
    runner.subscribe(tx);
    runner.watch().unwrap();
    assert!(runner.is_watching());

    runner.close();
    assert!(!runner.is_watching());
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn watch_runs_on_file_change() {
    let dir = TempDir::new().unwrap();
    let manifest = dir.path().join("deploy.yaml");
    fs::write(&manifest, "kind: Before\n").unwrap();
    let runner = CommandRunner::with_profile(
        dir.path(),
        "cat",
        Arc::new(Profile::new("cat", ["deploy.yaml"])),
        settings(),
    )
    .await
    .unwrap();
    let (tx, mut rx) = mpsc::channel(64);
    runner.subscribe(tx);
    runner.watch().unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    fs::write(&manifest, "kind: After\n").unwrap();

    let saw_change = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(event) = rx.recv().await {
            if let CommandEvent::End(output) = event {
                if output.resources.first().map(|r| r.kind()) == Some("After") {
                    return true;
                }
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    assert!(saw_change);
    runner.close();
}

#[tokio::test]
async fn watch_only_arms_selected_files() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.yaml"), "kind: A\n").unwrap();
    fs::write(dir.path().join("notes.txt"), "").unwrap();
    let profile = Profile::new("cat", ["a.yaml"]).with_source(r#"files.filter(f, pathExt(f) == ".yaml")"#);
    let runner = CommandRunner::with_profile(dir.path(), "yaml", Arc::new(profile), settings())
        .await
        .unwrap();
    let (tx, mut rx) = mpsc::channel(64);
    runner.subscribe(tx);
    runner.watch().unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    fs::write(dir.path().join("notes.txt"), "changed").unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(drain(&mut rx).is_empty());
    runner.close();
}

#[tokio::test]
async fn set_profile_rearms_watcher_for_new_files() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.yaml"), "kind: A\n").unwrap();
    fs::write(dir.path().join("notes.txt"), "kind: Before\n").unwrap();
    let yaml = Profile::new("cat", ["a.yaml"]).with_source(r#"files.filter(f, pathExt(f) == ".yaml")"#);
    let runner = CommandRunner::with_profile(dir.path(), "yaml", Arc::new(yaml), settings())
        .await
        .unwrap();
    let (tx, mut rx) = mpsc::channel(64);
    runner.subscribe(tx);
    runner.watch().unwrap();

    let txt = Profile::new("cat", ["notes.txt"]).with_source(r#"files.filter(f, pathExt(f) == ".txt")"#);
    runner.set_profile("txt", Arc::new(txt)).await.unwrap();
    assert!(runner.is_watching());

    tokio::time::sleep(Duration::from_millis(100)).await;
    fs::write(dir.path().join("a.yaml"), "kind: Changed\n").unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(drain(&mut rx).is_empty());

    fs::write(dir.path().join("notes.txt"), "kind: After\n").unwrap();
    let saw_change = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(event) = rx.recv().await {
            if let CommandEvent::End(output) = event {
                if output.resources.first().map(|r| r.kind()) == Some("After") {
                    return true;
                }
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    assert!(saw_change);
    runner.close();
}
