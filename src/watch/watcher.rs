// src/watch/watcher.rs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::engine::RuntimeEvent;
use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::event_handler::process_notify_event;

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive. Dropping it stops file
/// watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    dirs: Vec<PathBuf>,
}

impl WatcherHandle {
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("dirs", &self.dirs)
            .finish_non_exhaustive()
    }
}

/// Watch every directory in `dirs` (non-recursively) and send
/// `RuntimeEvent::FileCreated` for each regular file that appears.
///
/// Every directory must exist; a directory that cannot be watched is a
/// startup error.
pub fn spawn_watcher(
    dirs: Vec<PathBuf>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    spawn_watcher_with_fs(dirs, runtime_tx, Arc::new(RealFileSystem))
}

pub fn spawn_watcher_with_fs(
    dirs: Vec<PathBuf>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    fs: Arc<dyn FileSystem>,
) -> Result<WatcherHandle> {
    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    // Called synchronously by notify whenever an event arrives.
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("artifacts-mover: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("artifacts-mover: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    for dir in dirs.iter() {
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("watching {:?}", dir))?;
        info!("file watcher started on {:?}", dir);
    }

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            debug!(?event, "received notify event");
            if !process_notify_event(fs.as_ref(), &event, &runtime_tx).await {
                error!("runtime channel closed; stopping watcher loop");
                break;
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle {
        _inner: watcher,
        dirs,
    })
}
