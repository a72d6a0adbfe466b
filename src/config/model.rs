// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::ArtifactType;

/// Round timeout applied when a server does not set `round_timeout`.
pub const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_secs(4 * 60 * 60);

/// Configuration exactly as read from the TOML file.
///
/// ```toml
/// failed_upload_path = "./failed"
///
/// [servers.main]
/// round_timeout = "4h"
///
/// [servers.main.types.bf2demo]
/// location = "/srv/bf2/demos"
/// upload_path = "bf2demos"
/// move_path = "/srv/bf2/archive"
///
/// [[servers.main.upload]]
/// kind = "https"
/// url = "https://files.example.org/upload"
/// ```
///
/// Turn it into a [`ConfigFile`] with `ConfigFile::try_from`, which runs the
/// semantic checks in `validate.rs`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Root of the local holding area for artifacts whose round failed.
    #[serde(default = "default_failed_upload_path")]
    pub failed_upload_path: PathBuf,

    /// Servers keyed by name. The name is also the sub-directory used under
    /// `failed_upload_path`.
    #[serde(default)]
    pub servers: BTreeMap<String, RawServerConfig>,
}

/// `[servers.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawServerConfig {
    /// Duration string; `"0s"` disables the timeout. Unset means
    /// [`DEFAULT_ROUND_TIMEOUT`].
    #[serde(default)]
    pub round_timeout: Option<String>,

    /// Artifact locations keyed by artifact type name.
    #[serde(default)]
    pub types: BTreeMap<String, LocationConfig>,

    /// Upload backends. Every completed round goes to each of them.
    #[serde(default)]
    pub upload: Vec<UploadConfig>,

    #[serde(default)]
    pub notify: Option<NotifyConfig>,
}

/// Where one artifact type lives locally and where it goes remotely.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LocationConfig {
    /// Watched directory.
    pub location: PathBuf,

    /// Remote sub-path appended to the backend's base path or URL.
    #[serde(default)]
    pub upload_path: String,

    /// Archive directory for successfully uploaded files. When absent the
    /// file is deleted after upload.
    #[serde(default)]
    pub move_path: Option<PathBuf>,
}

/// One `[[servers.<name>.upload]]` entry.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum UploadConfig {
    Scp(ScpConfig),
    Https(HttpsConfig),
}

impl UploadConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            UploadConfig::Scp(_) => "scp",
            UploadConfig::Https(_) => "https",
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ScpConfig {
    /// Remote host name or address.
    pub address: String,

    #[serde(default)]
    pub port: Option<u16>,

    pub username: String,

    pub private_key_file: PathBuf,

    /// Remote directory that `upload_path` is resolved against.
    #[serde(default)]
    pub base_path: String,

    /// OpenSSH `known_hosts` file the server key must be listed in. Without
    /// it any host key is accepted.
    #[serde(default)]
    pub known_hosts_file: Option<PathBuf>,

    /// Connect and session timeout, e.g. `"20s"`.
    #[serde(default)]
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HttpsConfig {
    /// Base URL; the artifact's `upload_path` is appended to it.
    pub url: String,

    #[serde(default)]
    pub auth: HttpsAuth,

    /// Request timeout as a duration string. Defaults to 5 minutes.
    #[serde(default)]
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct HttpsAuth {
    #[serde(default)]
    pub basic: Option<BasicAuth>,

    /// Headers set on every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// `[servers.<name>.notify]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct NotifyConfig {
    pub webhook_url: String,

    /// Public base URL per artifact type name, used to build download links.
    #[serde(default)]
    pub urls: BTreeMap<String, String>,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub failed_upload_path: PathBuf,
    pub servers: BTreeMap<String, ServerConfig>,
}

/// Validated per-server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `None` when the timeout is disabled.
    pub round_timeout: Option<Duration>,
    pub types: BTreeMap<ArtifactType, LocationConfig>,
    pub upload: Vec<UploadConfig>,
    pub notify: Option<NotifyConfig>,
}

impl ServerConfig {
    /// True iff the server produces nothing but battle recordings.
    pub fn bf2demo_only(&self) -> bool {
        self.types.len() == 1 && self.types.contains_key(&ArtifactType::Bf2Demo)
    }
}

fn default_failed_upload_path() -> PathBuf {
    PathBuf::from("./failed")
}
