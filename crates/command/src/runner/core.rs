//! Core [`CommandRunner`] struct: rule binding, run/cancel, event fan-out.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use kat_core::EngineSettings;
use kat_rules::{select_rule, HookPhase, Profile, ResolvedRule};
use notify::RecommendedWatcher;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::{CommandError, Result};
use crate::event::{CommandEvent, CommandOutput};
use crate::hooks::run_hooks;
use crate::render::ProfileExec;

use super::watcher::{collect_files, watch_files};

/// Renders one target path with its bound profile.
///
/// Cheap to clone; clones share state. At most one run is un-canceled at a
/// time: starting a run cancels the one in flight.
#[derive(Clone)]
pub struct CommandRunner {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    settings: EngineSettings,
    state: Mutex<State>,
}

struct State {
    rule: ResolvedRule,
    current: Option<ActiveRun>,
    next_run: u64,
    subscribers: Vec<mpsc::Sender<CommandEvent>>,
    /// Active filesystem watcher (held to keep it alive).
    watcher: Option<RecommendedWatcher>,
}

struct ActiveRun {
    id: u64,
    cancel: CancelToken,
}

impl CommandRunner {
    /// Pick the first rule matching the target's files and bind its profile.
    ///
    /// A directory target is evaluated against the files directly inside it;
    /// a file target against itself, rooted at its parent directory. Runs
    /// the profile's init hooks before returning.
    pub async fn with_rules(
        path: impl Into<PathBuf>,
        rules: &[ResolvedRule],
        settings: EngineSettings,
    ) -> Result<Self> {
        let path = path.into();
        let (dir, files) = list_target(&path)?;
        let rule = select_rule(rules, &dir, &files)
            .cloned()
            .ok_or_else(|| CommandError::NoCommandForPath(path.clone()))?;
        info!(path = %path.display(), profile = %rule.profile_name(), "selected profile");
        Self::bind(path, &dir, rule, settings).await
    }

    /// Bind an explicit profile, skipping rule evaluation.
    pub async fn with_profile(
        path: impl Into<PathBuf>,
        name: &str,
        profile: Arc<Profile>,
        settings: EngineSettings,
    ) -> Result<Self> {
        let path = path.into();
        let (dir, _) = list_target(&path)?;
        let rule = ResolvedRule::for_profile(name, profile)?;
        Self::bind(path, &dir, rule, settings).await
    }

    async fn bind(
        path: PathBuf,
        dir: &Path,
        rule: ResolvedRule,
        settings: EngineSettings,
    ) -> Result<Self> {
        run_init(&rule, dir, settings.output_limit).await?;
        Ok(Self {
            inner: Arc::new(Inner {
                path,
                settings,
                state: Mutex::new(State {
                    rule,
                    current: None,
                    next_run: 0,
                    subscribers: Vec::new(),
                    watcher: None,
                }),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().expect("runner state lock poisoned")
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn profile_name(&self) -> String {
        self.lock().rule.profile_name().to_string()
    }

    pub fn profile(&self) -> Arc<Profile> {
        Arc::clone(self.lock().rule.profile())
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn is_watching(&self) -> bool {
        self.lock().watcher.is_some()
    }

    /// Switch to another profile. Runs its init hooks first; on failure the
    /// current profile stays bound. An armed watcher is re-armed for the new
    /// profile's files.
    pub async fn set_profile(&self, name: &str, profile: Arc<Profile>) -> Result<()> {
        let rule = ResolvedRule::for_profile(name, profile)?;
        let (dir, _) = list_target(&self.inner.path)?;
        run_init(&rule, &dir, self.inner.settings.output_limit).await?;

        let rearm = {
            let mut state = self.lock();
            state.rule = rule;
            state.watcher.is_some()
        };
        info!(path = %self.inner.path.display(), profile = %name, "switched profile");
        if rearm {
            self.watch()?;
        }
        Ok(())
    }

    /// Register an event listener. Delivery awaits each listener in turn, so
    /// a listener that stops draining stalls the runner.
    pub fn subscribe(&self, tx: mpsc::Sender<CommandEvent>) {
        self.lock().subscribers.push(tx);
    }

    /// Watch the profile's selected files and run on every change.
    ///
    /// Only files present now are watched. Must be called from within a
    /// tokio runtime; runs are spawned onto it.
    pub fn watch(&self) -> Result<()> {
        let handle = Handle::try_current().map_err(|e| CommandError::Io(io::Error::other(e)))?;
        let (dir, _) = list_target(&self.inner.path)?;
        let profile = self.profile();

        let files = collect_files(&self.inner.path);
        let (_, selected) = profile.evaluate(&dir.to_string_lossy(), &files);

        let weak = Arc::downgrade(&self.inner);
        let watcher = watch_files(&selected, move |event| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            debug!(paths = ?event.paths, kind = ?event.kind, "change detected");
            let runner = CommandRunner { inner };
            handle.spawn(async move {
                runner.run().await;
            });
        })?;

        info!(path = %self.inner.path.display(), files = selected.len(), "watching for changes");
        self.lock().watcher = Some(watcher);
        Ok(())
    }

    /// Run with a fresh root cancellation token.
    pub async fn run(&self) -> CommandOutput {
        self.run_with(&CancelToken::new()).await
    }

    /// Supersede any run in flight and execute the bound profile.
    ///
    /// The run is canceled if `parent` is. Subscribers get `Start`, then
    /// `End` or, if this run was itself superseded at any point before it
    /// finished, `Cancel`. The output is returned either way.
    pub async fn run_with(&self, parent: &CancelToken) -> CommandOutput {
        let (id, cancel, rule, superseded) = {
            let mut state = self.lock();
            let superseded = state.current.take().map(|run| {
                run.cancel.cancel();
                run.id
            });
            state.next_run += 1;
            let id = state.next_run;
            let cancel = parent.child();
            state.current = Some(ActiveRun {
                id,
                cancel: cancel.clone(),
            });
            (id, cancel, state.rule.clone(), superseded)
        };

        if let Some(previous) = superseded {
            debug!(run = previous, "canceled in-flight run");
            self.broadcast(CommandEvent::Cancel).await;
        }
        self.broadcast(CommandEvent::Start).await;

        let output = match fs::metadata(&self.inner.path) {
            Ok(meta) => {
                let dir = target_dir(&self.inner.path, meta.is_dir());
                rule.profile()
                    .exec(&dir, self.inner.settings.output_limit, &cancel)
                    .await
            }
            Err(e) => CommandOutput::failed(missing_or_io(&self.inner.path, e)),
        };
        let current = self.finish_run(id);

        // A run superseded after its command finished still reports Cancel.
        if output.is_canceled() || !current {
            debug!(run = id, "run superseded");
            self.broadcast(CommandEvent::Cancel).await;
            return output;
        }
        match &output.error {
            None => info!(
                path = %self.inner.path.display(),
                resources = output.resources.len(),
                elapsed_ms = output.duration().num_milliseconds(),
                "render finished"
            ),
            Some(e) => warn!(path = %self.inner.path.display(), error = %e, "render failed"),
        }
        self.broadcast(CommandEvent::End(output.clone())).await;
        output
    }

    /// Stop watching, cancel the run in flight and drop all subscribers.
    pub fn close(&self) {
        let mut state = self.lock();
        state.watcher = None;
        if let Some(run) = state.current.take() {
            run.cancel.cancel();
        }
        state.subscribers.clear();
        debug!(path = %self.inner.path.display(), "runner closed");
    }

    /// Clear the cancel handle if `id` still owns it. Returns false when the
    /// run was superseded or closed in the meantime.
    fn finish_run(&self, id: u64) -> bool {
        let mut state = self.lock();
        if state.current.as_ref().is_some_and(|run| run.id == id) {
            state.current = None;
            return true;
        }
        false
    }

    async fn broadcast(&self, event: CommandEvent) {
        let subscribers = self.lock().subscribers.clone();
        let mut closed = false;
        for tx in &subscribers {
            if tx.send(event.clone()).await.is_err() {
                closed = true;
            }
        }
        if closed {
            self.lock().subscribers.retain(|tx| !tx.is_closed());
        }
    }
}

async fn run_init(rule: &ResolvedRule, dir: &Path, limit: usize) -> Result<()> {
    let hooks = &rule.profile().hooks.init;
    if hooks.is_empty() {
        return Ok(());
    }
    run_hooks(HookPhase::Init, hooks, dir, None, limit, &CancelToken::new()).await?;
    debug!(profile = %rule.profile_name(), hooks = hooks.len(), "init hooks finished");
    Ok(())
}

/// Working directory and rule-evaluation file set for a target.
fn list_target(path: &Path) -> Result<(PathBuf, Vec<String>)> {
    let meta = fs::metadata(path).map_err(|e| missing_or_io(path, e))?;
    if !meta.is_dir() {
        let file = path.to_string_lossy().into_owned();
        return Ok((target_dir(path, false), vec![file]));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let child = entry.path();
        if child.is_file() {
            files.push(child.to_string_lossy().into_owned());
        }
    }
    files.sort();
    Ok((path.to_path_buf(), files))
}

fn target_dir(path: &Path, is_dir: bool) -> PathBuf {
    if is_dir {
        return path.to_path_buf();
    }
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn missing_or_io(path: &Path, e: io::Error) -> CommandError {
    if e.kind() == io::ErrorKind::NotFound {
        CommandError::TargetMissing(path.to_path_buf())
    } else {
        CommandError::Io(e)
    }
}
