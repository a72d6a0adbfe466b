// src/engine/orchestrator.rs

//! Delivery of completed rounds to every backend of a server.
//!
//! `upload` returns as soon as one action per backend is on the global
//! queue. A detached task (tracked, so shutdown and tests can await it)
//! collects the results and then either cleans up (all backends succeeded)
//! or backs the files up into the failure directory (any backend failed).

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::LocationConfig;
use crate::engine::aggregator::RoundSink;
use crate::engine::queue::{CompletionHandle, UploadQueue};
use crate::engine::round::{Artifact, CompletedRound, Round};
use crate::errors::UploadError;
use crate::fs::FileSystem;
use crate::notifier::Notifier;
use crate::types::ArtifactType;
use crate::upload::Uploader;

/// Terminal state of a submitted round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Every backend succeeded; files were moved or deleted.
    Cleaned,
    /// At least one backend failed; files went to the failure directory.
    BackedUp,
}

/// Per-server upload orchestrator. Cloning yields a handle to the same one.
#[derive(Clone)]
pub struct UploadOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    server: String,
    backends: Vec<Arc<dyn Uploader>>,
    queue: UploadQueue,
    locations: BTreeMap<ArtifactType, LocationConfig>,
    failed_dir: PathBuf,
    notifier: Option<Arc<dyn Notifier>>,
    fs: Arc<dyn FileSystem>,
    tracker: TaskTracker,
    /// Serializes `wait_idle`: one caller's `reopen` must not land between
    /// another caller's `close` and `wait`.
    idle_lock: tokio::sync::Mutex<()>,
}

impl fmt::Debug for UploadOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadOrchestrator")
            .field("server", &self.inner.server)
            .field("backends", &self.inner.backends)
            .field("failed_dir", &self.inner.failed_dir)
            .finish_non_exhaustive()
    }
}

impl UploadOrchestrator {
    /// `failed_dir` is this server's own failure directory
    /// (`<failed_upload_path>/<server>`).
    pub fn new(
        server: impl Into<String>,
        backends: Vec<Arc<dyn Uploader>>,
        queue: UploadQueue,
        locations: BTreeMap<ArtifactType, LocationConfig>,
        failed_dir: impl Into<PathBuf>,
        notifier: Option<Arc<dyn Notifier>>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                server: server.into(),
                backends,
                queue,
                locations,
                failed_dir: failed_dir.into(),
                notifier,
                fs,
                tracker: TaskTracker::new(),
                idle_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn server(&self) -> &str {
        &self.inner.server
    }

    pub fn failed_dir(&self) -> &Path {
        &self.inner.failed_dir
    }

    /// Queue `completed` on every backend and return immediately.
    ///
    /// The returned handle resolves once the round reached its terminal
    /// state. Dropping it is fine; the work stays tracked by
    /// [`UploadOrchestrator::wait_idle`].
    pub fn upload(&self, completed: CompletedRound) -> JoinHandle<RoundOutcome> {
        let mut handles: Vec<(String, CompletionHandle)> =
            Vec::with_capacity(self.inner.backends.len());
        let mut submit_failed = false;

        for backend in self.inner.backends.iter() {
            let name = backend.name().to_string();
            let backend = Arc::clone(backend);
            let round = completed.round.clone();

            let submitted = self.inner.queue.submit(move || async move {
                for artifact in round.artifacts() {
                    backend.upload(artifact).await?;
                }
                Ok::<(), UploadError>(())
            });

            match submitted {
                Ok(handle) => handles.push((name, handle)),
                Err(err) => {
                    error!(
                        server = %self.inner.server,
                        backend = %name,
                        error = %err,
                        "could not queue round upload"
                    );
                    submit_failed = true;
                }
            }
        }

        debug!(
            server = %self.inner.server,
            backends = handles.len(),
            files = completed.round.len(),
            "round queued for upload"
        );

        let inner = Arc::clone(&self.inner);
        self.inner
            .tracker
            .spawn(async move { inner.finish(completed, handles, submit_failed).await })
    }

    /// Wait until every round handed to this orchestrator so far reached its
    /// terminal state.
    ///
    /// Safe to call from several tasks at once; the callers take turns.
    pub async fn wait_idle(&self) {
        let _turn = self.inner.idle_lock.lock().await;
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        self.inner.tracker.reopen();
    }
}

impl RoundSink for UploadOrchestrator {
    fn submit(&self, round: CompletedRound) {
        // Tracked by `self.inner.tracker`; nothing to keep here.
        drop(self.upload(round));
    }
}

impl Inner {
    async fn finish(
        &self,
        completed: CompletedRound,
        handles: Vec<(String, CompletionHandle)>,
        submit_failed: bool,
    ) -> RoundOutcome {
        let mut failed = submit_failed;

        for (backend, handle) in handles {
            match handle.wait().await {
                Ok(()) => {
                    debug!(server = %self.server, %backend, "backend accepted round");
                }
                Err(err) => {
                    error!(
                        server = %self.server,
                        %backend,
                        error = %err,
                        "failed to upload round"
                    );
                    failed = true;
                }
            }
        }

        if failed {
            self.backup(&completed.round);
            return RoundOutcome::BackedUp;
        }

        info!(
            server = %self.server,
            files = completed.round.len(),
            reason = completed.reason.as_str(),
            "round uploaded"
        );
        self.cleanup(&completed.round);
        self.notify(&completed).await;
        RoundOutcome::Cleaned
    }

    /// Move or delete every artifact of a successfully uploaded round.
    fn cleanup(&self, round: &Round) {
        for artifact in round.artifacts() {
            let move_path = self
                .locations
                .get(&artifact.artifact_type)
                .and_then(|loc| loc.move_path.as_deref());

            match move_path {
                Some(dir) => {
                    let Some(dest) = destination(dir, artifact) else {
                        continue;
                    };
                    match self.fs.move_file(&artifact.path, &dest) {
                        Ok(()) => debug!(src = ?artifact.path, dst = ?dest, "archived file"),
                        Err(err) => error!(
                            server = %self.server,
                            path = ?artifact.path,
                            error = %err,
                            "failed to move file"
                        ),
                    }
                }
                None => match self.fs.remove_file(&artifact.path) {
                    Ok(()) => debug!(path = ?artifact.path, "removed uploaded file"),
                    Err(err) => error!(
                        server = %self.server,
                        path = ?artifact.path,
                        error = %err,
                        "failed to remove file"
                    ),
                },
            }
        }
    }

    /// Relocate every artifact of a failed round to
    /// `<failed_dir>/<type>/<file name>`.
    fn backup(&self, round: &Round) {
        for artifact in round.artifacts() {
            let dir = self.failed_dir.join(artifact.artifact_type.as_str());
            if let Err(err) = self.fs.create_dir_all(&dir) {
                error!(
                    server = %self.server,
                    dir = ?dir,
                    path = ?artifact.path,
                    error = %err,
                    "cannot create failure directory; leaving file in place"
                );
                continue;
            }

            let Some(dest) = destination(&dir, artifact) else {
                continue;
            };
            match self.fs.move_file(&artifact.path, &dest) {
                Ok(()) => warn!(
                    server = %self.server,
                    src = ?artifact.path,
                    dst = ?dest,
                    "moved artifact of failed round to failure directory"
                ),
                Err(err) => error!(
                    server = %self.server,
                    src = ?artifact.path,
                    dst = ?dest,
                    error = %err,
                    "failed to move file to failure directory"
                ),
            }
        }
    }

    async fn notify(&self, completed: &CompletedRound) {
        let Some(notifier) = self.notifier.as_ref() else {
            return;
        };
        if let Err(err) = notifier.notify(completed).await {
            error!(server = %self.server, error = %err, "failed to send notification");
        }
    }
}

fn destination(dir: &Path, artifact: &Artifact) -> Option<PathBuf> {
    match artifact.file_name() {
        Some(name) => Some(dir.join(name)),
        None => {
            error!(path = ?artifact.path, "artifact path has no file name");
            None
        }
    }
}
