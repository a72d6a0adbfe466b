// src/watch/event_handler.rs

//! Turning raw `notify` events into runtime events.

use std::path::PathBuf;

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::RuntimeEvent;
use crate::fs::FileSystem;
use crate::watch::path_utils::absolute_path;

/// Paths in `event` that may be new files in a watched directory.
///
/// - `Create` (except folders): every path.
/// - `Modify(Name(To))`: the destination of a move into the directory.
/// - `Modify(Name(Any))`: backends that cannot tell the sides of a rename
///   apart; only paths that still exist as files are kept.
///
/// `Name(Both)` is skipped: inotify emits it right after the `Name(To)` for
/// the same destination, which is already reported.
fn candidate_paths(fs: &dyn FileSystem, event: &Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => event.paths.clone(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths.clone(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => event
            .paths
            .iter()
            .filter(|p| fs.is_file(p))
            .cloned()
            .collect(),
        _ => Vec::new(),
    }
}

/// Forward the files that appeared through `event` to the runtime.
///
/// Modifications, removals and the source side of renames are ignored, and
/// so are directories. Returns `false` once the runtime channel is closed,
/// which tells the watcher loop to stop.
pub async fn process_notify_event(
    fs: &dyn FileSystem,
    event: &Event,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) -> bool {
    for path in candidate_paths(fs, event) {
        // `CreateKind::Any` on some platforms; ask the filesystem.
        if fs.is_dir(&path) {
            debug!(?path, "ignoring directory");
            continue;
        }

        let path = absolute_path(&path);
        debug!(?path, kind = ?event.kind, "file appeared");
        if let Err(err) = runtime_tx.send(RuntimeEvent::FileCreated { path }).await {
            warn!("failed to send RuntimeEvent::FileCreated: {err}");
            return false;
        }
    }

    true
}
