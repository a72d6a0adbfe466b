// src/notifier/webhook.rs

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

use anyhow::Context;
use serde_json::json;
use tracing::debug;

use crate::config::NotifyConfig;
use crate::engine::round::{CloseReason, CompletedRound};
use crate::errors::{MoverError, Result};
use crate::notifier::{Notifier, NotifyFuture};

/// Posts `{"content": "<message>"}` to a chat webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    server: String,
    client: reqwest::Client,
    webhook_url: String,
    urls: BTreeMap<String, String>,
}

impl WebhookNotifier {
    pub fn new(server: &str, config: &NotifyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MoverError::Other(anyhow::Error::from(e)))?;

        Ok(Self {
            server: server.to_string(),
            client,
            webhook_url: config.webhook_url.clone(),
            urls: config.urls.clone(),
        })
    }

    /// Message text for a round: a header line, then one line per artifact
    /// with a download link when a public URL is configured for its type.
    pub fn message(&self, completed: &CompletedRound) -> String {
        let mut text = format!("**{}**: round uploaded", self.server);
        if completed.reason != CloseReason::Complete {
            let _ = write!(text, " (incomplete, closed by {})", completed.reason.as_str());
        }

        for artifact in completed.round.artifacts() {
            let file_name = artifact
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let typ = artifact.artifact_type.as_str();
            match self.urls.get(typ) {
                Some(base) => {
                    let _ = write!(
                        text,
                        "\n{typ}: {}/{file_name}",
                        base.trim_end_matches('/')
                    );
                }
                None => {
                    let _ = write!(text, "\n{typ}: {file_name}");
                }
            }
        }

        text
    }

    async fn send(&self, completed: &CompletedRound) -> anyhow::Result<()> {
        let body = json!({ "content": self.message(completed) });
        debug!(server = %self.server, url = %self.webhook_url, "sending webhook notification");

        self.client
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await
            .context("sending webhook request")?
            .error_for_status()
            .context("webhook rejected notification")?;
        Ok(())
    }
}

impl Notifier for WebhookNotifier {
    fn notify<'a>(&'a self, round: &'a CompletedRound) -> NotifyFuture<'a> {
        Box::pin(self.send(round))
    }
}
