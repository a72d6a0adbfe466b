// src/config/validate.rs

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::config::model::{
    ConfigFile, RawConfigFile, RawServerConfig, ServerConfig, UploadConfig, DEFAULT_ROUND_TIMEOUT,
};
use crate::errors::{MoverError, Result};
use crate::types::{parse_duration, ArtifactType};
use crate::watch::path_utils::absolute_path;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = MoverError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_servers(&raw)?;

        let mut servers = BTreeMap::new();
        for (name, server) in raw.servers {
            let validated = validate_server(&name, server)?;
            servers.insert(name, validated);
        }

        ensure_unique_locations(&servers)?;

        Ok(ConfigFile {
            failed_upload_path: raw.failed_upload_path,
            servers,
        })
    }
}

/// Validate an already-built configuration again (e.g. one assembled in code).
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    if cfg.servers.is_empty() {
        return Err(no_servers_error());
    }
    for (name, server) in cfg.servers.iter() {
        if server.types.is_empty() {
            return Err(no_types_error(name));
        }
        if server.upload.is_empty() {
            return Err(no_upload_error(name));
        }
    }
    ensure_unique_locations(&cfg.servers)
}

fn ensure_has_servers(cfg: &RawConfigFile) -> Result<()> {
    if cfg.servers.is_empty() {
        return Err(no_servers_error());
    }
    Ok(())
}

fn validate_server(name: &str, raw: RawServerConfig) -> Result<ServerConfig> {
    if name.trim().is_empty() || name.contains(['/', '\\']) {
        return Err(MoverError::ConfigError(format!(
            "invalid server name '{name}': must be non-empty and must not contain path separators"
        )));
    }

    let round_timeout = match raw.round_timeout.as_deref() {
        None => Some(DEFAULT_ROUND_TIMEOUT),
        Some(s) => {
            let d = parse_duration(s).map_err(|e| {
                MoverError::ConfigError(format!("server '{name}': invalid round_timeout: {e}"))
            })?;
            (!d.is_zero()).then_some(d)
        }
    };

    if raw.types.is_empty() {
        return Err(no_types_error(name));
    }

    let mut types = BTreeMap::new();
    for (type_name, location) in raw.types {
        let typ: ArtifactType = type_name
            .parse()
            .map_err(|e| MoverError::ConfigError(format!("server '{name}': {e}")))?;
        if location.location.as_os_str().is_empty() {
            return Err(MoverError::ConfigError(format!(
                "server '{name}': type '{typ}' has an empty location"
            )));
        }
        types.insert(typ, location);
    }

    if raw.upload.is_empty() {
        return Err(no_upload_error(name));
    }
    for upload in raw.upload.iter() {
        validate_upload(name, upload)?;
    }

    if let Some(notify) = raw.notify.as_ref() {
        for type_name in notify.urls.keys() {
            type_name.parse::<ArtifactType>().map_err(|e| {
                MoverError::ConfigError(format!("server '{name}': notify.urls: {e}"))
            })?;
        }
    }

    Ok(ServerConfig {
        round_timeout,
        types,
        upload: raw.upload,
        notify: raw.notify,
    })
}

fn validate_upload(server: &str, upload: &UploadConfig) -> Result<()> {
    match upload {
        UploadConfig::Scp(scp) => {
            if scp.address.trim().is_empty() || scp.username.trim().is_empty() {
                return Err(MoverError::ConfigError(format!(
                    "server '{server}': scp upload needs both address and username"
                )));
            }
            if let Some(timeout) = scp.timeout.as_deref() {
                parse_duration(timeout).map_err(|e| {
                    MoverError::ConfigError(format!("server '{server}': invalid scp timeout: {e}"))
                })?;
            }
        }
        UploadConfig::Https(https) => {
            if !https.url.starts_with("http://") && !https.url.starts_with("https://") {
                return Err(MoverError::ConfigError(format!(
                    "server '{server}': https upload url must start with http:// or https:// (got '{}')",
                    https.url
                )));
            }
            if let Some(timeout) = https.timeout.as_deref() {
                parse_duration(timeout).map_err(|e| {
                    MoverError::ConfigError(format!(
                        "server '{server}': invalid https timeout: {e}"
                    ))
                })?;
            }
        }
    }
    Ok(())
}

/// A watched directory may only feed one (server, type) pair; otherwise a
/// created file could not be attributed unambiguously.
fn ensure_unique_locations(servers: &BTreeMap<String, ServerConfig>) -> Result<()> {
    let mut seen: HashMap<PathBuf, (String, ArtifactType)> = HashMap::new();

    for (name, server) in servers.iter() {
        for (typ, location) in server.types.iter() {
            let dir = absolute_path(&location.location);
            if let Some((other_server, other_type)) = seen.get(&dir) {
                return Err(MoverError::ConfigError(format!(
                    "location {:?} is used by both '{}/{}' and '{}/{}'",
                    dir, other_server, other_type, name, typ
                )));
            }
            seen.insert(dir, (name.clone(), *typ));
        }
    }

    Ok(())
}

fn no_servers_error() -> MoverError {
    MoverError::ConfigError(
        "config must contain at least one [servers.<name>] section".to_string(),
    )
}

fn no_types_error(server: &str) -> MoverError {
    MoverError::ConfigError(format!(
        "server '{server}' must configure at least one [servers.{server}.types.<type>] location"
    ))
}

fn no_upload_error(server: &str) -> MoverError {
    MoverError::ConfigError(format!(
        "server '{server}' must configure at least one [[servers.{server}.upload]] backend"
    ))
}
