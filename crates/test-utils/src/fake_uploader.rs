use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use artifacts_mover::engine::Artifact;
use artifacts_mover::errors::UploadError;
use artifacts_mover::upload::{UploadFuture, Uploader};

/// One recorded upload event, in the order the fake saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Started { backend: String, path: PathBuf },
    Finished { backend: String, path: PathBuf },
}

/// Log shared between several fakes, so tests can check global ordering.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Paths whose upload finished on `backend`, in order.
    pub fn finished_on(&self, backend: &str) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Finished { backend: b, path } if b == backend => Some(path),
                _ => None,
            })
            .collect()
    }

    /// True if no two uploads overlapped in time.
    pub fn strictly_sequential(&self) -> bool {
        let mut running = false;
        for call in self.calls() {
            match call {
                Call::Started { .. } if running => return false,
                Call::Started { .. } => running = true,
                Call::Finished { .. } => running = false,
            }
        }
        true
    }
}

/// A fake backend that:
/// - records every upload in a [`CallLog`]
/// - optionally sleeps to simulate a slow transfer
/// - optionally fails every upload
#[derive(Debug, Clone)]
pub struct FakeUploader {
    name: String,
    log: CallLog,
    delay: Option<Duration>,
    fail: bool,
}

impl FakeUploader {
    pub fn new(name: &str, log: CallLog) -> Self {
        Self {
            name: name.to_string(),
            log,
            delay: None,
            fail: false,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn into_arc(self) -> Arc<dyn Uploader> {
        Arc::new(self)
    }
}

impl Uploader for FakeUploader {
    fn name(&self) -> &str {
        &self.name
    }

    fn upload<'a>(&'a self, artifact: &'a Artifact) -> UploadFuture<'a> {
        Box::pin(async move {
            self.log.push(Call::Started {
                backend: self.name.clone(),
                path: artifact.path.clone(),
            });

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            self.log.push(Call::Finished {
                backend: self.name.clone(),
                path: artifact.path.clone(),
            });

            if self.fail {
                Err(UploadError::Other(format!("{} refused {:?}", self.name, artifact.path)))
            } else {
                Ok(())
            }
        })
    }
}
