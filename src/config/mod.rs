// src/config/mod.rs

//! Configuration loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate servers, locations and backends (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, DEFAULT_CONFIG_FILE};
pub use model::{
    BasicAuth, ConfigFile, HttpsAuth, HttpsConfig, LocationConfig, NotifyConfig, RawConfigFile,
    RawServerConfig, ScpConfig, ServerConfig, UploadConfig, DEFAULT_ROUND_TIMEOUT,
};
pub use validate::validate_config;
