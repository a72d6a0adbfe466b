// src/upload/mod.rs

//! Backend uploaders.
//!
//! Each backend delivers one artifact at a time to a remote destination. The
//! orchestrator never calls them directly; it wraps "upload this round via
//! this backend" into an action on the global upload queue.
//!
//! - [`scp`] shells out to the system `scp` binary.
//! - [`https`] POSTs a multipart form with `reqwest`.

pub mod https;
pub mod scp;

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::{LocationConfig, UploadConfig};
use crate::engine::round::Artifact;
use crate::errors::{Result, UploadError};
use crate::types::ArtifactType;

pub use https::HttpsUploader;
pub use scp::ScpUploader;

pub type UploadFuture<'a> = Pin<Box<dyn Future<Output = std::result::Result<(), UploadError>> + Send + 'a>>;

/// A transport that can deliver one artifact.
///
/// Implementations must be safe to call from the upload queue worker.
pub trait Uploader: Send + Sync + Debug {
    /// Short label used in logs, e.g. `"scp://files.example.org"`.
    fn name(&self) -> &str;

    fn upload<'a>(&'a self, artifact: &'a Artifact) -> UploadFuture<'a>;
}

/// Build one uploader per `[[servers.<name>.upload]]` entry.
pub fn build_uploaders(
    configs: &[UploadConfig],
    locations: &BTreeMap<ArtifactType, LocationConfig>,
) -> Result<Vec<Arc<dyn Uploader>>> {
    let upload_paths: BTreeMap<ArtifactType, String> = locations
        .iter()
        .map(|(typ, loc)| (*typ, loc.upload_path.clone()))
        .collect();

    configs
        .iter()
        .map(|config| -> Result<Arc<dyn Uploader>> {
            match config {
                UploadConfig::Scp(scp) => {
                    Ok(Arc::new(ScpUploader::new(scp, upload_paths.clone())?))
                }
                UploadConfig::Https(https) => {
                    Ok(Arc::new(HttpsUploader::new(https, upload_paths.clone())?))
                }
            }
        })
        .collect()
}

/// Join URL or remote path segments with exactly one `/` between them,
/// skipping empty segments.
pub fn join_segments<'a>(segments: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for segment in segments {
        if segment.is_empty() {
            continue;
        }
        if out.is_empty() {
            out.push_str(segment.trim_end_matches('/'));
            if out.is_empty() {
                // A bare "/" root.
                out.push('/');
            }
            continue;
        }
        let trimmed = segment.trim_matches('/');
        if trimmed.is_empty() {
            continue;
        }
        if !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(trimmed);
    }
    out
}

pub(crate) fn file_name_of(artifact: &Artifact) -> std::result::Result<String, UploadError> {
    artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| UploadError::NoFileName {
            path: artifact.path.clone(),
        })
}
