//! File discovery and notify wiring for [`CommandRunner::watch`](super::CommandRunner::watch).

use std::path::Path;

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::Result;

/// Whether an event should trigger a run: create, write, remove or rename.
pub(super) fn is_trigger(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}

/// Every regular file under `target`, recursively. Hidden entries below the
/// root are skipped. A file target yields itself.
pub(super) fn collect_files(target: &Path) -> Vec<String> {
    WalkDir::new(target)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path().to_string_lossy().into_owned())
        .collect()
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

/// Watch each file (not its directory) and call `on_change` for trigger events.
pub(super) fn watch_files<F>(files: &[String], on_change: F) -> Result<RecommendedWatcher>
where
    F: Fn(&Event) + Send + 'static,
{
    let mut watcher = notify::recommended_watcher(
        move |res: std::result::Result<Event, notify::Error>| match res {
            Ok(event) if is_trigger(&event.kind) => on_change(&event),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "filesystem watcher error"),
        },
    )?;

    for file in files {
        if let Err(e) = watcher.watch(Path::new(file), RecursiveMode::NonRecursive) {
            warn!(path = %file, error = %e, "failed to watch file");
            continue;
        }
        debug!(path = %file, "watching file");
    }
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RenameMode};
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn trigger_kinds() {
        assert!(is_trigger(&EventKind::Create(CreateKind::File)));
        assert!(is_trigger(&EventKind::Modify(ModifyKind::Data(DataChange::Content))));
        assert!(is_trigger(&EventKind::Modify(ModifyKind::Name(RenameMode::Both))));
        assert!(is_trigger(&EventKind::Remove(notify::event::RemoveKind::File)));
        assert!(!is_trigger(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any))));
        assert!(!is_trigger(&EventKind::Access(AccessKind::Any)));
    }

    #[test]
    fn collects_nested_files_skipping_hidden() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("templates")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("Chart.yaml"), "").unwrap();
        fs::write(dir.path().join("templates/cm.yaml"), "").unwrap();
        fs::write(dir.path().join(".git/HEAD"), "").unwrap();
        fs::write(dir.path().join(".hidden.yaml"), "").unwrap();

        let mut files = collect_files(dir.path());
        files.sort();
        let expected: Vec<String> = ["Chart.yaml", "templates/cm.yaml"]
            .iter()
            .map(|f| dir.path().join(f).to_string_lossy().into_owned())
            .collect();
        assert_eq!(files, expected);
    }

    #[test]
    fn file_target_yields_itself() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("deploy.yaml");
        fs::write(&file, "").unwrap();
        assert_eq!(collect_files(&file), vec![file.to_string_lossy().into_owned()]);
    }
}
