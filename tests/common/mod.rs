#![allow(dead_code)]

use std::path::Path;

use artifacts_mover::engine::Artifact;
use artifacts_mover::types::ArtifactType;

pub use artifacts_mover_test_utils::{init_tracing, with_timeout};

pub fn bf2(path: impl AsRef<Path>) -> Artifact {
    Artifact::new(path.as_ref(), ArtifactType::Bf2Demo)
}

pub fn pr(path: impl AsRef<Path>) -> Artifact {
    Artifact::new(path.as_ref(), ArtifactType::PrDemo)
}

pub fn summary(path: impl AsRef<Path>) -> Artifact {
    Artifact::new(path.as_ref(), ArtifactType::Summary)
}

/// File names of a round's artifacts, in type order.
pub fn names(round: &artifacts_mover::engine::Round) -> Vec<String> {
    round
        .artifacts()
        .map(|a| a.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}
