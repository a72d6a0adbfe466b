// src/engine/server.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::engine::aggregator::RoundAggregator;
use crate::engine::orchestrator::UploadOrchestrator;
use crate::engine::queue::UploadQueue;
use crate::engine::reconcile::replay_existing;
use crate::engine::round::Artifact;
use crate::errors::{MoverError, Result};
use crate::fs::FileSystem;
use crate::notifier::{build_notifier, Notifier};
use crate::types::ArtifactType;
use crate::upload::{build_uploaders, Uploader};
use crate::watch::path_utils::absolute_path;

/// Everything that runs for one configured game server: its aggregator, its
/// orchestrator and the mapping from watched directory to artifact type.
#[derive(Debug, Clone)]
pub struct ServerRuntime {
    name: String,
    fs: Arc<dyn FileSystem>,
    /// Absolute watch directory → type.
    dirs: BTreeMap<PathBuf, ArtifactType>,
    aggregator: RoundAggregator,
    orchestrator: UploadOrchestrator,
}

impl ServerRuntime {
    /// Wire up a server from already-built backends.
    ///
    /// Creates `<failed_root>/<name>/<type>` for every configured type and
    /// every `move_path`; failing to create any of them is fatal.
    pub fn new(
        name: &str,
        config: &ServerConfig,
        failed_root: &Path,
        queue: UploadQueue,
        backends: Vec<Arc<dyn Uploader>>,
        notifier: Option<Arc<dyn Notifier>>,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self> {
        let failed_dir = failed_root.join(name);
        for (artifact_type, location) in config.types.iter() {
            let dir = failed_dir.join(artifact_type.as_str());
            fs.create_dir_all(&dir).map_err(|e| {
                MoverError::ConfigError(format!(
                    "server {name}: cannot create failure directory {dir:?}: {e:#}"
                ))
            })?;

            if let Some(move_path) = location.move_path.as_deref() {
                fs.create_dir_all(move_path).map_err(|e| {
                    MoverError::ConfigError(format!(
                        "server {name}: cannot create move_path {move_path:?}: {e:#}"
                    ))
                })?;
            }
        }

        let dirs: BTreeMap<PathBuf, ArtifactType> = config
            .types
            .iter()
            .map(|(typ, loc)| (absolute_path(&loc.location), *typ))
            .collect();

        let orchestrator = UploadOrchestrator::new(
            name,
            backends,
            queue,
            config.types.clone(),
            failed_dir,
            notifier,
            Arc::clone(&fs),
        );

        let aggregator = RoundAggregator::new(
            name,
            config.types.len(),
            config.bf2demo_only(),
            config.round_timeout,
            Arc::new(orchestrator.clone()),
        );

        debug!(
            server = %name,
            types = config.types.len(),
            round_timeout = ?config.round_timeout,
            "server runtime ready"
        );

        Ok(Self {
            name: name.to_string(),
            fs,
            dirs,
            aggregator,
            orchestrator,
        })
    }

    /// Build backends and notifier from `config`, then wire up the server.
    pub fn from_config(
        name: &str,
        config: &ServerConfig,
        failed_root: &Path,
        queue: UploadQueue,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self> {
        let backends = build_uploaders(&config.upload, &config.types)?;
        let notifier = build_notifier(name, config.notify.as_ref())?;
        Self::new(name, config, failed_root, queue, backends, notifier, fs)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aggregator(&self) -> &RoundAggregator {
        &self.aggregator
    }

    pub fn orchestrator(&self) -> &UploadOrchestrator {
        &self.orchestrator
    }

    /// Absolute directories this server watches.
    pub fn watch_dirs(&self) -> impl Iterator<Item = &Path> {
        self.dirs.keys().map(PathBuf::as_path)
    }

    /// Type of a file at `path`, decided by the directory it lives in.
    pub fn artifact_type_for(&self, path: &Path) -> Option<ArtifactType> {
        let parent = path.parent()?;
        self.dirs.get(&absolute_path(parent)).copied()
    }

    /// Handle a newly created file. Returns `false` if the path is not in one
    /// of this server's directories.
    pub fn on_file_created(&self, path: &Path) -> bool {
        match self.artifact_type_for(path) {
            Some(artifact_type) => {
                self.aggregator
                    .on_artifact(Artifact::new(absolute_path(path), artifact_type));
                true
            }
            None => false,
        }
    }

    /// Replay files already present in the watched directories.
    pub fn reconcile(&self) -> anyhow::Result<usize> {
        let mut dirs: Vec<(ArtifactType, PathBuf)> = self
            .dirs
            .iter()
            .map(|(dir, typ)| (*typ, dir.clone()))
            .collect();
        dirs.sort_by_key(|(typ, _)| *typ);
        replay_existing(self.fs.as_ref(), &dirs, &self.aggregator)
    }

    pub fn shutdown(&self) {
        info!(server = %self.name, "shutting down server");
        self.aggregator.shutdown();
    }

    /// Wait until every round handed off so far reached its terminal state.
    pub async fn wait_idle(&self) {
        self.orchestrator.wait_idle().await;
    }
}

