// src/upload/scp.rs

use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ssh2::{CheckResult, KnownHostFileKind, Session};
use tracing::{debug, info};

use crate::config::ScpConfig;
use crate::engine::round::Artifact;
use crate::errors::{MoverError, Result, UploadError};
use crate::types::{parse_duration, ArtifactType};
use crate::upload::{file_name_of, join_segments, UploadFuture, Uploader};

const DEFAULT_PORT: u16 = 22;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
const REMOTE_FILE_MODE: i32 = 0o644;

/// Uploads artifacts over SCP using key authentication.
///
/// `ssh2` is blocking, so every transfer runs on the blocking thread pool
/// with its own session.
#[derive(Debug, Clone)]
pub struct ScpUploader {
    name: String,
    target: Arc<SshTarget>,
    base_path: String,
    upload_paths: BTreeMap<ArtifactType, String>,
}

/// Where and how to open an SSH session.
#[derive(Debug)]
struct SshTarget {
    host: String,
    port: u16,
    username: String,
    private_key_file: PathBuf,
    known_hosts_file: Option<PathBuf>,
    timeout: Duration,
}

impl ScpUploader {
    /// The private key must exist; a missing key is a startup error rather
    /// than a failure of every round.
    pub fn new(config: &ScpConfig, upload_paths: BTreeMap<ArtifactType, String>) -> Result<Self> {
        if !config.private_key_file.is_file() {
            return Err(MoverError::ConfigError(format!(
                "scp private key {:?} does not exist or is not a file",
                config.private_key_file
            )));
        }

        let timeout = match config.timeout.as_deref() {
            Some(s) => parse_duration(s)
                .map_err(|e| MoverError::ConfigError(format!("invalid scp timeout: {e}")))?,
            None => DEFAULT_TIMEOUT,
        };

        let (host, port) = split_host_port(&config.address, config.port);
        Ok(Self {
            name: format!("scp://{host}"),
            target: Arc::new(SshTarget {
                host,
                port: port.unwrap_or(DEFAULT_PORT),
                username: config.username.clone(),
                private_key_file: config.private_key_file.clone(),
                known_hosts_file: config.known_hosts_file.clone(),
                timeout,
            }),
            base_path: config.base_path.clone(),
            upload_paths,
        })
    }

    /// `host:port` the session connects to.
    pub fn address(&self) -> String {
        self.target.address()
    }

    /// `<base_path>/<upload_path>/<file name>` on the remote host.
    pub fn remote_path(&self, artifact: &Artifact) -> std::result::Result<String, UploadError> {
        let file_name = file_name_of(artifact)?;
        let upload_path = self
            .upload_paths
            .get(&artifact.artifact_type)
            .map(String::as_str)
            .unwrap_or("");
        Ok(join_segments([
            self.base_path.as_str(),
            upload_path,
            file_name.as_str(),
        ]))
    }

    async fn upload_inner(&self, artifact: &Artifact) -> std::result::Result<(), UploadError> {
        let remote = self.remote_path(artifact)?;
        debug!(backend = %self.name, path = ?artifact.path, %remote, "starting scp");

        let target = Arc::clone(&self.target);
        let local = artifact.path.clone();
        let remote_path = remote.clone();
        let size = tokio::task::spawn_blocking(move || target.send_file(&local, &remote_path))
            .await
            .map_err(|e| UploadError::Other(format!("scp transfer task failed: {e}")))??;

        info!(backend = %self.name, path = ?artifact.path, %remote, size, "uploaded via scp");
        Ok(())
    }
}

impl SshTarget {
    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn ssh_error(&self, source: ssh2::Error) -> UploadError {
        UploadError::Ssh {
            address: self.address(),
            source,
        }
    }

    /// Copy `local` to `remote`. Returns the number of bytes sent.
    fn send_file(&self, local: &Path, remote: &str) -> std::result::Result<u64, UploadError> {
        let read_error = |source: io::Error| UploadError::ReadArtifact {
            path: local.to_path_buf(),
            source,
        };
        let mut file = File::open(local).map_err(read_error)?;
        let size = file.metadata().map_err(read_error)?.len();

        let session = self.connect()?;
        let mut channel = session
            .scp_send(Path::new(remote), REMOTE_FILE_MODE, size, None)
            .map_err(|e| self.ssh_error(e))?;

        io::copy(&mut file, &mut channel).map_err(|source| UploadError::ScpWrite {
            remote: remote.to_string(),
            source,
        })?;

        channel.send_eof().map_err(|e| self.ssh_error(e))?;
        channel.wait_eof().map_err(|e| self.ssh_error(e))?;
        channel.close().map_err(|e| self.ssh_error(e))?;
        channel.wait_close().map_err(|e| self.ssh_error(e))?;
        Ok(size)
    }

    fn connect(&self) -> std::result::Result<Session, UploadError> {
        let tcp = self.connect_tcp()?;

        let mut session = Session::new().map_err(|e| self.ssh_error(e))?;
        session.set_timeout(u32::try_from(self.timeout.as_millis()).unwrap_or(u32::MAX));
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| self.ssh_error(e))?;

        self.verify_host_key(&session)?;

        session
            .userauth_pubkey_file(&self.username, None, &self.private_key_file, None)
            .map_err(|e| self.ssh_error(e))?;
        if !session.authenticated() {
            return Err(UploadError::Other(format!(
                "ssh authentication as {} on {} was not accepted",
                self.username,
                self.address()
            )));
        }
        Ok(session)
    }

    fn connect_tcp(&self) -> std::result::Result<TcpStream, UploadError> {
        let connect_error = |source: io::Error| UploadError::Connect {
            address: self.address(),
            source,
        };

        let mut last_error = None;
        for addr in (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(connect_error)?
        {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => return Ok(stream),
                Err(err) => last_error = Some(err),
            }
        }

        Err(connect_error(last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
        })))
    }

    fn verify_host_key(&self, session: &Session) -> std::result::Result<(), UploadError> {
        let Some(known_hosts_file) = self.known_hosts_file.as_deref() else {
            return Ok(());
        };

        let mut known_hosts = session.known_hosts().map_err(|e| self.ssh_error(e))?;
        known_hosts
            .read_file(known_hosts_file, KnownHostFileKind::OpenSSH)
            .map_err(|e| self.ssh_error(e))?;

        let host_key_error = |reason: String| UploadError::HostKey {
            address: self.address(),
            reason,
        };
        let (key, _) = session
            .host_key()
            .ok_or_else(|| host_key_error("was not offered".to_string()))?;

        match known_hosts.check_port(&self.host, self.port, key) {
            CheckResult::Match => Ok(()),
            CheckResult::NotFound => Err(host_key_error(format!(
                "is not listed in {known_hosts_file:?}"
            ))),
            CheckResult::Mismatch => Err(host_key_error(format!(
                "does not match {known_hosts_file:?}"
            ))),
            CheckResult::Failure => Err(host_key_error("could not be checked".to_string())),
        }
    }
}

/// Accepts `host` or `host:port`; an explicit `port` setting wins.
fn split_host_port(address: &str, port: Option<u16>) -> (String, Option<u16>) {
    match address.rsplit_once(':') {
        Some((host, tail)) if !host.is_empty() && !host.contains(':') => match tail.parse() {
            Ok(parsed) => (host.to_string(), port.or(Some(parsed))),
            Err(_) => (address.to_string(), port),
        },
        _ => (address.to_string(), port),
    }
}

impl Uploader for ScpUploader {
    fn name(&self) -> &str {
        &self.name
    }

    fn upload<'a>(&'a self, artifact: &'a Artifact) -> UploadFuture<'a> {
        Box::pin(self.upload_inner(artifact))
    }
}
