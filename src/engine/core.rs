// src/engine/core.rs

//! Pure round-aggregation state machine.
//!
//! [`RoundCore`] consumes artifacts and timer firings for one server and
//! produces [`AggregatorStep`]s: a list of commands describing what the shell
//! (`engine::aggregator::RoundAggregator`) should do next:
//! - arm or cancel the round timer
//! - hand a closed round to the upload orchestrator
//!
//! It has no channels, no Tokio types and performs no IO, so every
//! membership and timing rule can be tested synchronously.

use std::time::Duration;

use tracing::debug;

use crate::engine::round::{Artifact, CloseReason, CompletedRound, Round};

/// Command produced by the core, executed by the aggregator shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregatorCommand {
    /// Start a one-shot timer that reports back with this epoch.
    ArmTimer { epoch: u64, after: Duration },
    /// Stop the pending timer, if any.
    CancelTimer,
    /// Hand this round to the upload orchestrator.
    Submit(CompletedRound),
}

/// Result of feeding one input into the core.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatorStep {
    pub commands: Vec<AggregatorCommand>,
}

impl AggregatorStep {
    /// Rounds submitted by this step, in order.
    pub fn submitted(&self) -> impl Iterator<Item = &CompletedRound> {
        self.commands.iter().filter_map(|c| match c {
            AggregatorCommand::Submit(round) => Some(round),
            _ => None,
        })
    }
}

/// Per-server round state.
///
/// Invariants:
/// - `current` never holds two artifacts of the same type.
/// - `epoch` increases every time a non-empty round is handed off, so a timer
///   armed for an earlier round can be recognised and ignored.
#[derive(Debug)]
pub struct RoundCore {
    current: Round,
    types_count: usize,
    bf2demo_only: bool,
    round_timeout: Option<Duration>,
    epoch: u64,
    timer_armed: bool,
}

impl RoundCore {
    pub fn new(types_count: usize, bf2demo_only: bool, round_timeout: Option<Duration>) -> Self {
        Self {
            current: Round::new(),
            types_count: types_count.max(1),
            bf2demo_only,
            round_timeout: round_timeout.filter(|d| !d.is_zero()),
            epoch: 0,
            timer_armed: false,
        }
    }

    pub fn current_round(&self) -> &Round {
        &self.current
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn timer_armed(&self) -> bool {
        self.timer_armed
    }

    /// Add a newly observed artifact to the open round.
    pub fn on_artifact(&mut self, artifact: Artifact) -> AggregatorStep {
        let mut step = AggregatorStep::default();

        if self.current.contains(artifact.artifact_type) {
            debug!(
                artifact_type = %artifact.artifact_type,
                "type already in current round; closing it"
            );
            self.close_into(CloseReason::Overlap, &mut step);
        }

        // Single-type servers, and the last missing type of a multi-type
        // round, complete the round on insertion.
        let completes = self.bf2demo_only || self.current.len() + 1 >= self.types_count;

        if self.current.is_empty() && !self.bf2demo_only && !completes {
            if let Some(after) = self.round_timeout {
                debug!(?after, epoch = self.epoch, "arming round timer");
                self.timer_armed = true;
                step.commands.push(AggregatorCommand::ArmTimer {
                    epoch: self.epoch,
                    after,
                });
            }
        }

        if let Err(rejected) = self.current.insert(artifact) {
            // Unreachable: an overlap closed the round above.
            debug!(path = ?rejected.path, "duplicate artifact type after close");
            return step;
        }

        if completes {
            self.close_into(CloseReason::Complete, &mut step);
        }

        step
    }

    /// The timer armed for `epoch` fired.
    pub fn on_timer(&mut self, epoch: u64) -> AggregatorStep {
        let mut step = AggregatorStep::default();

        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, "ignoring stale round timer");
            return step;
        }
        // The timer has fired, so there is nothing left to cancel.
        self.timer_armed = false;
        if !self.current.is_empty() {
            self.close_into(CloseReason::Timeout, &mut step);
        }
        step
    }

    /// Force-close the open round. A no-op on an empty round apart from
    /// cancelling a pending timer.
    pub fn close(&mut self, reason: CloseReason) -> AggregatorStep {
        let mut step = AggregatorStep::default();
        self.close_into(reason, &mut step);
        step
    }

    /// Stop the pending timer without closing the round.
    pub fn shutdown(&mut self) -> AggregatorStep {
        let mut step = AggregatorStep::default();
        self.cancel_timer_into(&mut step);
        step
    }

    fn close_into(&mut self, reason: CloseReason, step: &mut AggregatorStep) {
        self.cancel_timer_into(step);

        if self.current.is_empty() {
            return;
        }

        let round = std::mem::take(&mut self.current);
        self.epoch += 1;
        step.commands
            .push(AggregatorCommand::Submit(CompletedRound { round, reason }));
    }

    fn cancel_timer_into(&mut self, step: &mut AggregatorStep) {
        if self.timer_armed {
            self.timer_armed = false;
            step.commands.push(AggregatorCommand::CancelTimer);
        }
    }
}
