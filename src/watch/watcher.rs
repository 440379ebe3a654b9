// src/watch/watcher.rs

use std::path::{Path, PathBuf};

use anyhow::Result;
use notify::event::{ModifyKind, RemoveKind};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::filer::{ChangeKind, FileChange};
use crate::watch::path_utils::to_source_id;

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive. Dropping this handle
/// stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Map a notify event kind onto a filer change kind.
///
/// Renames are reported per path; whether the path still exists tells the
/// two halves apart. Directory events are dropped, except removals, which
/// the filer resolves against the files it knows.
pub fn classify(kind: &EventKind, path: &Path) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) if path.is_file() => Some(ChangeKind::Create),
        EventKind::Modify(ModifyKind::Name(_)) => {
            if path.is_file() {
                Some(ChangeKind::Create)
            } else if path.exists() {
                None
            } else {
                Some(ChangeKind::Delete)
            }
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) if path.is_file() => Some(ChangeKind::Update),
        EventKind::Remove(RemoveKind::Folder | RemoveKind::File | RemoveKind::Any) => {
            Some(ChangeKind::Delete)
        }
        _ => None,
    }
}

/// Watch `source_dir` recursively and send a [`FileChange`] for every file
/// event under it.
pub fn spawn_watcher(source_dir: &str, changes_tx: mpsc::Sender<FileChange>) -> Result<WatcherHandle> {
    let root = PathBuf::from(source_dir);
    let source_dir = source_dir.to_string();

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("filer: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("filer: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!(root = ?root, "file watcher started");

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            trace!(?event, "received notify event");
            for path in &event.paths {
                let Some(kind) = classify(&event.kind, path) else {
                    continue;
                };
                let Some(id) = to_source_id(&source_dir, path) else {
                    continue;
                };
                if changes_tx.send(FileChange::new(kind, id)).await.is_err() {
                    debug!("change receiver dropped; stopping watcher loop");
                    return;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}
