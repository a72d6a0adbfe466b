// src/notifier/mod.rs

//! Post-upload notification sinks.
//!
//! A notifier is called once per round, only after every backend accepted
//! it. Its failures are logged by the orchestrator and never retried.

pub mod webhook;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;

use crate::config::NotifyConfig;
use crate::engine::round::CompletedRound;

pub use webhook::WebhookNotifier;

pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

pub trait Notifier: Send + Sync {
    fn notify<'a>(&'a self, round: &'a CompletedRound) -> NotifyFuture<'a>;
}

/// Build the notifier configured for `server`, if any.
pub fn build_notifier(
    server: &str,
    config: Option<&NotifyConfig>,
) -> crate::errors::Result<Option<Arc<dyn Notifier>>> {
    match config {
        Some(config) => Ok(Some(Arc::new(WebhookNotifier::new(server, config)?))),
        None => Ok(None),
    }
}
