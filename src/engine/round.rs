// src/engine/round.rs

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::types::ArtifactType;

/// A concrete file discovered in a watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub artifact_type: ArtifactType,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, artifact_type: ArtifactType) -> Self {
        Self {
            path: path.into(),
            artifact_type,
        }
    }

    pub fn file_name(&self) -> Option<&OsStr> {
        self.path.file_name()
    }
}

/// The artifacts belonging to one play session on one server, at most one
/// per [`ArtifactType`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Round {
    artifacts: BTreeMap<ArtifactType, Artifact>,
}

impl Round {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn contains(&self, artifact_type: ArtifactType) -> bool {
        self.artifacts.contains_key(&artifact_type)
    }

    pub fn get(&self, artifact_type: ArtifactType) -> Option<&Artifact> {
        self.artifacts.get(&artifact_type)
    }

    /// Add an artifact. If its type is already present the round is left
    /// untouched and the artifact is handed back.
    pub fn insert(&mut self, artifact: Artifact) -> Result<(), Artifact> {
        if self.contains(artifact.artifact_type) {
            return Err(artifact);
        }
        self.artifacts.insert(artifact.artifact_type, artifact);
        Ok(())
    }

    /// Artifacts in [`ArtifactType`] order.
    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.values()
    }

    pub fn types(&self) -> impl Iterator<Item = ArtifactType> + '_ {
        self.artifacts.keys().copied()
    }

    pub fn paths(&self) -> Vec<&Path> {
        self.artifacts.values().map(|a| a.path.as_path()).collect()
    }
}

/// Why a round was handed to the uploader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Every configured type arrived.
    Complete,
    /// A second artifact of an already-collected type arrived.
    Overlap,
    /// The round timeout elapsed before the round completed.
    Timeout,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::Complete => "complete",
            CloseReason::Overlap => "overlap",
            CloseReason::Timeout => "timeout",
        }
    }
}

/// A closed round on its way to the upload orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedRound {
    pub round: Round,
    pub reason: CloseReason,
}
