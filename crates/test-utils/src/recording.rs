use std::sync::{Arc, Mutex};

use artifacts_mover::engine::{CompletedRound, RoundSink};
use artifacts_mover::notifier::{Notifier, NotifyFuture};

/// Round sink that just remembers what it was given.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    rounds: Arc<Mutex<Vec<CompletedRound>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rounds(&self) -> Vec<CompletedRound> {
        self.rounds.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.rounds.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RoundSink for RecordingSink {
    fn submit(&self, round: CompletedRound) {
        self.rounds.lock().unwrap().push(round);
    }
}

/// Notifier that records every round it is told about and can be made to
/// fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    rounds: Arc<Mutex<Vec<CompletedRound>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            rounds: Arc::default(),
            fail: true,
        }
    }

    pub fn rounds(&self) -> Vec<CompletedRound> {
        self.rounds.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.rounds.lock().unwrap().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify<'a>(&'a self, round: &'a CompletedRound) -> NotifyFuture<'a> {
        Box::pin(async move {
            self.rounds.lock().unwrap().push(round.clone());
            if self.fail {
                anyhow::bail!("notification endpoint unavailable");
            }
            Ok(())
        })
    }
}
