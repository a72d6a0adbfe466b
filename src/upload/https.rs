// src/upload/https.rs

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Body;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::config::{BasicAuth, HttpsConfig};
use crate::engine::round::Artifact;
use crate::errors::{MoverError, Result, UploadError};
use crate::types::{parse_duration, ArtifactType};
use crate::upload::{file_name_of, join_segments, UploadFuture, Uploader};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Multipart form field carrying the file.
pub const FORM_FIELD: &str = "artifact";

/// POSTs each artifact as `multipart/form-data` to `<url>/<upload_path>`.
#[derive(Debug, Clone)]
pub struct HttpsUploader {
    name: String,
    client: reqwest::Client,
    url: String,
    basic: Option<BasicAuth>,
    headers: BTreeMap<String, String>,
    upload_paths: BTreeMap<ArtifactType, String>,
}

impl HttpsUploader {
    pub fn new(config: &HttpsConfig, upload_paths: BTreeMap<ArtifactType, String>) -> Result<Self> {
        let timeout = match config.timeout.as_deref() {
            Some(s) => parse_duration(s)
                .map_err(|e| MoverError::ConfigError(format!("invalid https timeout: {e}")))?,
            None => DEFAULT_TIMEOUT,
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MoverError::Other(anyhow::Error::from(e)))?;

        Ok(Self {
            name: config.url.clone(),
            client,
            url: config.url.clone(),
            basic: config.auth.basic.clone(),
            headers: config.auth.headers.clone(),
            upload_paths,
        })
    }

    /// Endpoint for one artifact type.
    pub fn endpoint(&self, artifact_type: ArtifactType) -> String {
        let upload_path = self
            .upload_paths
            .get(&artifact_type)
            .map(String::as_str)
            .unwrap_or("");
        join_segments([self.url.as_str(), upload_path])
    }

    async fn upload_inner(&self, artifact: &Artifact) -> std::result::Result<(), UploadError> {
        let file_name = file_name_of(artifact)?;
        let read_error = |source: std::io::Error| UploadError::ReadArtifact {
            path: artifact.path.clone(),
            source,
        };
        let file = tokio::fs::File::open(&artifact.path)
            .await
            .map_err(read_error)?;
        let size = file.metadata().await.map_err(read_error)?.len();

        let body = Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, size)
            .file_name(file_name)
            .mime_str("application/octet-stream")?;
        let form = Form::new().part(FORM_FIELD, part);

        let url = self.endpoint(artifact.artifact_type);
        debug!(backend = %self.name, path = ?artifact.path, %url, size, "posting artifact");

        let mut request = self.client.post(&url).multipart(form);
        for (key, value) in self.headers.iter() {
            request = request.header(key.as_str(), value.as_str());
        }
        if let Some(basic) = self.basic.as_ref() {
            request = request.basic_auth(&basic.username, Some(&basic.password));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status { url, status });
        }

        info!(backend = %self.name, path = ?artifact.path, %url, "uploaded via https");
        Ok(())
    }
}

impl Uploader for HttpsUploader {
    fn name(&self) -> &str {
        &self.name
    }

    fn upload<'a>(&'a self, artifact: &'a Artifact) -> UploadFuture<'a> {
        Box::pin(self.upload_inner(artifact))
    }
}
