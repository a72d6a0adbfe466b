// src/engine/aggregator.rs

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::core::{AggregatorCommand, AggregatorStep, RoundCore};
use crate::engine::round::{Artifact, CloseReason, CompletedRound, Round};

/// Receiver of closed rounds.
///
/// `submit` is called with the aggregator lock held, so implementations must
/// not block; the upload orchestrator only enqueues work and returns.
pub trait RoundSink: Send + Sync {
    fn submit(&self, round: CompletedRound);
}

/// Per-server round aggregator: the locked IO shell around [`RoundCore`].
///
/// Live file events and round-timer firings both go through the same mutex,
/// so whichever gets there first wins and the other sees the updated round.
/// Cloning is cheap and yields a handle to the same aggregator.
#[derive(Clone)]
pub struct RoundAggregator {
    shared: Arc<Shared>,
}

struct Shared {
    server: String,
    state: Mutex<AggregatorState>,
    sink: Arc<dyn RoundSink>,
}

struct AggregatorState {
    core: RoundCore,
    timer: Option<JoinHandle<()>>,
    shut_down: bool,
}

impl fmt::Debug for RoundAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoundAggregator")
            .field("server", &self.shared.server)
            .finish_non_exhaustive()
    }
}

impl RoundAggregator {
    pub fn new(
        server: impl Into<String>,
        types_count: usize,
        bf2demo_only: bool,
        round_timeout: Option<Duration>,
        sink: Arc<dyn RoundSink>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                server: server.into(),
                state: Mutex::new(AggregatorState {
                    core: RoundCore::new(types_count, bf2demo_only, round_timeout),
                    timer: None,
                    shut_down: false,
                }),
                sink,
            }),
        }
    }

    pub fn server(&self) -> &str {
        &self.shared.server
    }

    /// Feed a newly observed artifact into the open round.
    ///
    /// Must be called from within a Tokio runtime, since it may arm the round
    /// timer.
    pub fn on_artifact(&self, artifact: Artifact) {
        debug!(
            server = %self.shared.server,
            path = ?artifact.path,
            artifact_type = %artifact.artifact_type,
            "handling artifact"
        );

        let mut state = self.lock();
        if state.shut_down {
            warn!(
                server = %self.shared.server,
                path = ?artifact.path,
                "aggregator shut down; ignoring artifact"
            );
            return;
        }

        let step = state.core.on_artifact(artifact);
        self.apply(&mut state, step);
    }

    /// Force-close the open round. Closing an empty round does nothing.
    pub fn close_round(&self, reason: CloseReason) {
        let mut state = self.lock();
        let step = state.core.close(reason);
        self.apply(&mut state, step);
    }

    /// Cancel the pending round timer and stop accepting artifacts. The open
    /// round is left as is; its files stay where they are on disk.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        state.shut_down = true;
        let step = state.core.shutdown();
        self.apply(&mut state, step);

        let pending = state.core.current_round().len();
        if pending > 0 {
            info!(
                server = %self.shared.server,
                files = pending,
                "leaving open round on disk for the next startup scan"
            );
        }
    }

    /// Snapshot of the open round.
    pub fn current_round(&self) -> Round {
        self.lock().core.current_round().clone()
    }

    pub fn timer_armed(&self) -> bool {
        self.lock().core.timer_armed()
    }

    fn on_timer(&self, epoch: u64) {
        let mut state = self.lock();
        if state.shut_down {
            return;
        }

        // A stale timer must not drop the handle of the current round's timer.
        if state.core.epoch() == epoch {
            state.timer = None;
        }

        let step = state.core.on_timer(epoch);
        if step.submitted().next().is_some() {
            warn!(
                server = %self.shared.server,
                "round timeout reached; closing incomplete round"
            );
        }
        self.apply(&mut state, step);
    }

    fn apply(&self, state: &mut AggregatorState, step: AggregatorStep) {
        for command in step.commands {
            match command {
                AggregatorCommand::CancelTimer => {
                    if let Some(timer) = state.timer.take() {
                        timer.abort();
                    }
                }
                AggregatorCommand::ArmTimer { epoch, after } => {
                    if let Some(previous) = state.timer.take() {
                        previous.abort();
                    }
                    state.timer = Some(self.spawn_timer(epoch, after));
                }
                AggregatorCommand::Submit(completed) => {
                    info!(
                        server = %self.shared.server,
                        files = completed.round.len(),
                        reason = completed.reason.as_str(),
                        "round closed"
                    );
                    self.shared.sink.submit(completed);
                }
            }
        }
    }

    fn spawn_timer(&self, epoch: u64, after: Duration) -> JoinHandle<()> {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(shared) = weak.upgrade() {
                RoundAggregator { shared }.on_timer(epoch);
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, AggregatorState> {
        // The state is only ever replaced wholesale, so it is consistent
        // even if a holder panicked.
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
