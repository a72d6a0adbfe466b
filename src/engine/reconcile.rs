// src/engine/reconcile.rs

//! Startup scan for artifacts left behind by a previous run.
//!
//! Files already sitting in a watched directory never produce a create
//! event. They are listed once before the watcher starts and replayed into
//! the aggregator as if they had just appeared: the n-th file (by name) of
//! every type is offered together, so leftovers from the same session are
//! likely to end up in the same round.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::engine::aggregator::RoundAggregator;
use crate::engine::round::Artifact;
use crate::fs::FileSystem;
use crate::types::ArtifactType;

/// List the regular files of every `(type, dir)` pair and return them in
/// replay order.
///
/// Directories are visited in the given order, files within one directory
/// sorted by file name. The result interleaves the per-type lists by index.
/// A directory that cannot be listed (missing included) is an error.
pub fn collect_existing(
    fs: &dyn FileSystem,
    dirs: &[(ArtifactType, PathBuf)],
) -> Result<Vec<Artifact>> {
    let mut per_type: Vec<Vec<Artifact>> = Vec::with_capacity(dirs.len());

    for (artifact_type, dir) in dirs {
        let mut files: Vec<PathBuf> = fs
            .read_dir(dir)
            .with_context(|| format!("listing watched directory {:?}", dir))?
            .into_iter()
            .filter(|p| fs.is_file(p))
            .collect();
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        debug!(dir = ?dir, files = files.len(), "scanned watched directory");
        per_type.push(
            files
                .into_iter()
                .map(|p| Artifact::new(p, *artifact_type))
                .collect(),
        );
    }

    let longest = per_type.iter().map(Vec::len).max().unwrap_or(0);
    let mut ordered = Vec::with_capacity(per_type.iter().map(Vec::len).sum());
    for index in 0..longest {
        for files in per_type.iter() {
            if let Some(artifact) = files.get(index) {
                ordered.push(artifact.clone());
            }
        }
    }
    Ok(ordered)
}

/// Feed every leftover artifact of `dirs` into `aggregator`. Returns how many
/// files were replayed.
pub fn replay_existing(
    fs: &dyn FileSystem,
    dirs: &[(ArtifactType, PathBuf)],
    aggregator: &RoundAggregator,
) -> Result<usize> {
    let artifacts = collect_existing(fs, dirs)?;
    let count = artifacts.len();

    for artifact in artifacts {
        aggregator.on_artifact(artifact);
    }

    if count > 0 {
        info!(server = %aggregator.server(), files = count, "replayed leftover artifacts");
    }
    Ok(count)
}

