// src/errors.rs

//! Crate-wide error types.
//!
//! - [`MoverError`] covers configuration and startup failures. These are the
//!   only errors allowed to abort the process.
//! - [`UploadError`] is what a single backend transfer (or the upload queue
//!   itself) reports. It is always contained at the orchestrator boundary.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MoverError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure of one upload action.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("reading artifact {path:?}: {source}")]
    ReadArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("connecting to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ssh session with {address}: {source}")]
    Ssh {
        address: String,
        #[source]
        source: ssh2::Error,
    },

    #[error("host key of {address} {reason}")]
    HostKey { address: String, reason: String },

    #[error("sending {remote} over scp: {source}")]
    ScpWrite {
        remote: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} responded with status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("artifact {path:?} has no file name")]
    NoFileName { path: PathBuf },

    #[error("upload queue is closed")]
    QueueClosed,

    #[error("upload task was dropped before completion")]
    Abandoned,

    #[error("{0}")]
    Other(String),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, MoverError>;
