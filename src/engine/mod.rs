// src/engine/mod.rs

//! Round aggregation and upload engine.
//!
//! Per server:
//! - [`aggregator`] groups created files into rounds, driven by the pure
//!   state machine in [`core`].
//! - [`orchestrator`] fans a closed round out to every backend, then cleans
//!   up or backs the files up.
//!
//! Shared by all servers:
//! - [`queue`] runs every transfer one at a time.
//! - [`runtime`] routes watcher events and drives shutdown.

use std::path::PathBuf;

/// Events flowing into the runtime from the watcher and signal handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    /// A regular file appeared at `path`.
    FileCreated { path: PathBuf },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod aggregator;
pub mod core;
pub mod orchestrator;
pub mod queue;
pub mod reconcile;
pub mod round;
pub mod runtime;
pub mod server;

pub use aggregator::{RoundAggregator, RoundSink};
pub use core::{AggregatorCommand, AggregatorStep, RoundCore};
pub use orchestrator::{RoundOutcome, UploadOrchestrator};
pub use queue::{CompletionHandle, UploadQueue};
pub use round::{Artifact, CloseReason, CompletedRound, Round};
pub use runtime::Runtime;
pub use server::ServerRuntime;
