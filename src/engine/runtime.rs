// src/engine/runtime.rs

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::queue::UploadQueue;
use crate::engine::server::ServerRuntime;
use crate::engine::RuntimeEvent;
use crate::errors::{MoverError, Result};
use crate::watch::path_utils::absolute_path;

/// Routes watcher events to the server owning the directory they happened
/// in and drives an orderly shutdown.
///
/// This is the IO shell around the per-server aggregators: it owns the event
/// channel, the routing table and the shared upload queue.
pub struct Runtime {
    servers: Vec<ServerRuntime>,
    /// Watched directory → index into `servers`.
    routes: BTreeMap<PathBuf, usize>,
    queue: UploadQueue,
    event_rx: mpsc::Receiver<RuntimeEvent>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("servers", &self.servers.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(
        servers: Vec<ServerRuntime>,
        queue: UploadQueue,
        event_rx: mpsc::Receiver<RuntimeEvent>,
    ) -> Result<Self> {
        let mut routes = BTreeMap::new();
        for (index, server) in servers.iter().enumerate() {
            for dir in server.watch_dirs() {
                if let Some(previous) = routes.insert(dir.to_path_buf(), index) {
                    return Err(MoverError::ConfigError(format!(
                        "directory {dir:?} is watched by both '{}' and '{}'",
                        servers[previous].name(),
                        server.name()
                    )));
                }
            }
        }

        Ok(Self {
            servers,
            routes,
            queue,
            event_rx,
        })
    }

    pub fn servers(&self) -> &[ServerRuntime] {
        &self.servers
    }

    /// Every directory the watcher must observe.
    pub fn watch_dirs(&self) -> Vec<PathBuf> {
        self.routes.keys().cloned().collect()
    }

    /// Replay leftovers of every server. Returns the number of files replayed.
    pub fn reconcile(&self) -> Result<usize> {
        let mut total = 0;
        for server in self.servers.iter() {
            total += server.reconcile().map_err(|e| {
                MoverError::ConfigError(format!(
                    "server {}: startup scan failed: {e:#}",
                    server.name()
                ))
            })?;
        }
        Ok(total)
    }

    /// Route one created file. Returns `false` if no server owns its directory.
    pub fn route(&self, path: &Path) -> bool {
        let Some(parent) = path.parent() else {
            return false;
        };
        match self.routes.get(&absolute_path(parent)) {
            Some(&index) => self.servers[index].on_file_created(path),
            None => false,
        }
    }

    /// Main event loop. Returns after a shutdown request (or once every
    /// sender is gone) and all in-flight uploads have finished.
    pub async fn run(mut self) -> Result<()> {
        info!(servers = self.servers.len(), "artifacts-mover runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            match event {
                RuntimeEvent::FileCreated { path } => {
                    if !self.route(&path) {
                        warn!(path = ?path, "file is not in any configured directory; ignoring");
                    }
                }
                RuntimeEvent::ShutdownRequested => {
                    info!("shutdown requested");
                    break;
                }
            }
        }

        self.shutdown().await;
        info!("runtime exiting");
        Ok(())
    }

    /// Stop every aggregator, close the queue and wait for queued uploads
    /// and their cleanup to finish. Open rounds are left on disk.
    pub async fn shutdown(&self) {
        for server in self.servers.iter() {
            server.shutdown();
        }

        self.queue.close();
        debug!(pending = self.queue.len(), "waiting for upload queue to drain");
        self.queue.wait_idle().await;

        for server in self.servers.iter() {
            server.wait_idle().await;
        }
    }
}
