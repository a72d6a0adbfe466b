// src/engine/queue.rs

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{oneshot, watch};
use tracing::{debug, warn};

use crate::errors::UploadError;

/// Future returned by a queued action.
pub type ActionFuture = Pin<Box<dyn Future<Output = Result<(), UploadError>> + Send>>;

type Action = Box<dyn FnOnce() -> ActionFuture + Send>;

/// Global FIFO runner for outbound transfers.
///
/// Semantics:
/// - Actions run one at a time, strictly in submission order, no matter which
///   server or backend submitted them. This is the process-wide bandwidth
///   limiter.
/// - `submit` never blocks; it only appends under a short lock. The worker
///   task is spawned on the 0 → 1 transition and stops itself once the queue
///   drains.
/// - An action's error goes to its own [`CompletionHandle`] and never stops
///   the actions queued behind it.
/// - After [`UploadQueue::close`] new submissions are rejected, while queued
///   and in-flight actions still run to completion.
///
/// Cloning is cheap and yields a handle to the same queue.
#[derive(Clone)]
pub struct UploadQueue {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<QueueState>,
    /// `true` while the queue is empty and no worker is running.
    idle: watch::Sender<bool>,
}

#[derive(Default)]
struct QueueState {
    /// The head entry stays in place while it runs, so a non-empty deque
    /// always means "a worker is alive".
    items: VecDeque<QueueItem>,
    closed: bool,
}

struct QueueItem {
    action: Option<Action>,
    done: Option<oneshot::Sender<Result<(), UploadError>>>,
}

/// Awaitable result of one submitted action.
#[derive(Debug)]
pub struct CompletionHandle {
    rx: oneshot::Receiver<Result<(), UploadError>>,
}

impl CompletionHandle {
    /// Wait for the action to finish and return its result.
    pub async fn wait(self) -> Result<(), UploadError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(UploadError::Abandoned),
        }
    }
}

impl fmt::Debug for UploadQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("UploadQueue")
            .field("len", &state.items.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl Default for UploadQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadQueue {
    pub fn new() -> Self {
        let (idle, _) = watch::channel(true);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                idle,
            }),
        }
    }

    /// Append `action` to the tail of the queue.
    ///
    /// Must be called from within a Tokio runtime, since it may spawn the
    /// worker.
    pub fn submit<F, Fut>(&self, action: F) -> Result<CompletionHandle, UploadError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), UploadError>> + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let item = QueueItem {
            action: Some(Box::new(move || Box::pin(action()) as ActionFuture)),
            done: Some(done_tx),
        };

        let mut state = self.lock();
        if state.closed {
            return Err(UploadError::QueueClosed);
        }

        let was_empty = state.items.is_empty();
        state.items.push_back(item);
        debug!(queued = state.items.len(), "upload action queued");

        if was_empty {
            self.shared.idle.send_replace(false);
            tokio::spawn(run_worker(Arc::clone(&self.shared)));
        }

        Ok(CompletionHandle { rx: done_rx })
    }

    /// Reject further submissions. Already queued actions still run.
    pub fn close(&self) {
        let mut state = self.lock();
        if !state.closed {
            debug!(pending = state.items.len(), "closing upload queue");
        }
        state.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of actions queued, including the one currently running.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve once the queue is empty and its worker has stopped.
    pub async fn wait_idle(&self) {
        let mut rx = self.shared.idle.subscribe();
        // The sender lives in `self.shared`, so this cannot fail.
        let _ = rx.wait_for(|idle| *idle).await;
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.shared.lock()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Worker loop: run the head action unlocked, report its result, pop it,
/// and exit once nothing is left.
async fn run_worker(shared: Arc<Shared>) {
    debug!("upload worker started");

    loop {
        let (action, done) = {
            let mut state = shared.lock();
            match state.items.front_mut() {
                Some(head) => (head.action.take(), head.done.take()),
                None => {
                    shared.idle.send_replace(true);
                    return;
                }
            }
        };

        let result = match action {
            // Run on its own task so a panicking backend cannot take the
            // worker (and with it the whole queue) down.
            Some(action) => match tokio::spawn(action()).await {
                Ok(result) => result,
                Err(err) => Err(UploadError::Other(format!("upload action panicked: {err}"))),
            },
            None => Err(UploadError::Abandoned),
        };

        if let Err(err) = &result {
            warn!(error = %err, "upload action failed");
        }

        if let Some(done) = done {
            if done.send(result).is_err() {
                debug!("submitter dropped its completion handle");
            }
        }

        let mut state = shared.lock();
        state.items.pop_front();
        if state.items.is_empty() {
            shared.idle.send_replace(true);
            debug!("upload queue drained; worker stopping");
            return;
        }
    }
}
