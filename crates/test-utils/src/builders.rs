#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use artifacts_mover::config::{
    ConfigFile, HttpsAuth, HttpsConfig, LocationConfig, NotifyConfig, RawConfigFile,
    RawServerConfig, ServerConfig, UploadConfig,
};
use artifacts_mover::types::ArtifactType;

/// Builder for `ConfigFile` that goes through the same validation as a file
/// read from disk.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                failed_upload_path: PathBuf::from("./failed"),
                servers: BTreeMap::new(),
            },
        }
    }

    pub fn failed_upload_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.failed_upload_path = path.into();
        self
    }

    pub fn with_server(mut self, name: &str, server: RawServerConfig) -> Self {
        self.config.servers.insert(name.to_string(), server);
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a single server, usable both as a validated [`ServerConfig`]
/// and as the raw TOML-shaped section.
pub struct ServerConfigBuilder {
    round_timeout: Option<Duration>,
    types: BTreeMap<ArtifactType, LocationConfig>,
    upload: Vec<UploadConfig>,
    notify: Option<NotifyConfig>,
}

impl ServerConfigBuilder {
    pub fn new() -> Self {
        Self {
            round_timeout: None,
            types: BTreeMap::new(),
            upload: Vec::new(),
            notify: None,
        }
    }

    pub fn round_timeout(mut self, timeout: Duration) -> Self {
        self.round_timeout = Some(timeout);
        self
    }

    /// Watch `location` for `typ`; delete files after a successful upload.
    pub fn with_type(mut self, typ: ArtifactType, location: impl AsRef<Path>) -> Self {
        self.types.insert(
            typ,
            LocationConfig {
                location: location.as_ref().to_path_buf(),
                upload_path: typ.as_str().to_string(),
                move_path: None,
            },
        );
        self
    }

    /// Watch `location` for `typ`; archive files into `move_path` after a
    /// successful upload.
    pub fn with_type_moved(
        mut self,
        typ: ArtifactType,
        location: impl AsRef<Path>,
        move_path: impl AsRef<Path>,
    ) -> Self {
        self.types.insert(
            typ,
            LocationConfig {
                location: location.as_ref().to_path_buf(),
                upload_path: typ.as_str().to_string(),
                move_path: Some(move_path.as_ref().to_path_buf()),
            },
        );
        self
    }

    pub fn with_https(mut self, url: &str) -> Self {
        self.upload.push(UploadConfig::Https(HttpsConfig {
            url: url.to_string(),
            auth: HttpsAuth::default(),
            timeout: None,
        }));
        self
    }

    pub fn with_upload(mut self, upload: UploadConfig) -> Self {
        self.upload.push(upload);
        self
    }

    pub fn with_notify(mut self, webhook_url: &str) -> Self {
        self.notify = Some(NotifyConfig {
            webhook_url: webhook_url.to_string(),
            urls: BTreeMap::new(),
        });
        self
    }

    /// Validated form. Backends default to a single local HTTPS endpoint so
    /// the config is complete even when tests inject fake uploaders.
    pub fn build(self) -> ServerConfig {
        let upload = if self.upload.is_empty() {
            vec![UploadConfig::Https(HttpsConfig {
                url: "http://127.0.0.1:9/upload".to_string(),
                auth: HttpsAuth::default(),
                timeout: None,
            })]
        } else {
            self.upload
        };

        ServerConfig {
            round_timeout: self.round_timeout,
            types: self.types,
            upload,
            notify: self.notify,
        }
    }

    /// TOML-shaped form for feeding into [`ConfigFileBuilder`].
    pub fn raw(self) -> RawServerConfig {
        RawServerConfig {
            round_timeout: Some(match self.round_timeout {
                Some(d) => format!("{}ms", d.as_millis()),
                None => "0s".to_string(),
            }),
            types: self
                .types
                .into_iter()
                .map(|(typ, loc)| (typ.as_str().to_string(), loc))
                .collect(),
            upload: self.upload,
            notify: self.notify,
        }
    }
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
