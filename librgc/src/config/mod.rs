//! Application configuration.
//!
//! This module manages configuration with sensible defaults, loaded from a
//! YAML file. Every consumer receives the resolved `Config` explicitly;
//! there is no process-global configuration.

use crate::error::{Result, RgcError};
use config::{Config as ConfigRs, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[cfg(test)]
mod tests;

/// Root configuration structure.
#[derive(Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub registry: Registry,
    #[serde(default)]
    pub network: Network,
    #[serde(default)]
    pub scan: Scan,
    #[serde(default)]
    pub sweep: Sweep,
}

impl Config {
    /// Parses a `Config` from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let builder = ConfigRs::builder()
            .add_source(ConfigRs::try_from(&Config::default()).map_err(Self::build_error)?)
            .add_source(File::from_str(s, FileFormat::Yaml));

        builder
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(Self::build_error)
    }

    /// Loads a `Config` from an optional file path.
    ///
    /// With no path a default configuration is returned.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ConfigRs::builder()
            .add_source(ConfigRs::try_from(&Config::default()).map_err(Self::build_error)?);

        if let Some(p) = path {
            builder = builder.add_source(File::from(p).required(true));
        }

        builder
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(Self::build_error)
    }

    fn build_error(e: config::ConfigError) -> RgcError {
        RgcError::config_with_source("Failed to load configuration", None::<&str>, e)
    }
}

/// Registry storage settings.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Registry {
    /// Storage driver. Only `s3` is supported.
    #[serde(default = "default_registry_driver")]
    pub driver: String,

    #[serde(default)]
    pub bucket: String,

    /// Key prefix the registry stores its data under.
    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub access_key: String,

    #[serde(default)]
    pub secret_key: String,

    #[serde(default = "default_registry_region")]
    pub region: String,

    /// Use HTTPS for store requests.
    #[serde(default = "default_registry_secure")]
    pub secure: bool,

    /// Endpoint override for S3-compatible services. When unset, the
    /// endpoint is derived from the region.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            driver: default_registry_driver(),
            bucket: String::new(),
            path: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            region: default_registry_region(),
            secure: default_registry_secure(),
            endpoint: None,
        }
    }
}

fn default_registry_driver() -> String {
    "s3".to_string()
}

fn default_registry_region() -> String {
    "us-east-1".to_string()
}

fn default_registry_secure() -> bool {
    true
}

/// Network settings.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Network {
    /// Per-request timeout in seconds.
    #[serde(default = "default_network_timeout")]
    pub timeout: u64,

    /// Maximum retries for idempotent store requests.
    #[serde(default = "default_network_retries")]
    pub retries: u32,

    /// Additive backoff step in seconds between retries.
    #[serde(default = "default_network_retry_step")]
    pub retry_step: u64,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            timeout: default_network_timeout(),
            retries: default_network_retries(),
            retry_step: default_network_retry_step(),
        }
    }
}

fn default_network_timeout() -> u64 {
    30
}

fn default_network_retries() -> u32 {
    3
}

fn default_network_retry_step() -> u64 {
    2
}

/// Scanner settings.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Scan {
    /// Concurrent in-flight items per pass.
    #[serde(default = "default_scan_concurrency")]
    pub concurrency: usize,

    /// Consecutive identical failures before a pass is aborted.
    #[serde(default = "default_scan_dead_letter")]
    pub dead_letter: usize,

    /// Optional path for the intermediate graph snapshot written after
    /// ancestry import. Nothing is written when unset.
    #[serde(default)]
    pub snapshot_path: Option<String>,
}

impl Default for Scan {
    fn default() -> Self {
        Self {
            concurrency: default_scan_concurrency(),
            dead_letter: default_scan_dead_letter(),
            snapshot_path: None,
        }
    }
}

fn default_scan_concurrency() -> usize {
    25
}

fn default_scan_dead_letter() -> usize {
    5
}

/// Sweep settings.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Sweep {
    /// Path of the persisted sweep-state file.
    #[serde(default = "default_sweep_state_file")]
    pub state_file: String,

    /// Default minimum unreferenced age, in age syntax (`1d`, `12h`, ...).
    #[serde(default = "default_sweep_default_age")]
    pub default_age: String,
}

impl Default for Sweep {
    fn default() -> Self {
        Self {
            state_file: default_sweep_state_file(),
            default_age: default_sweep_default_age(),
        }
    }
}

fn default_sweep_state_file() -> String {
    "delete.json".to_string()
}

fn default_sweep_default_age() -> String {
    "1d".to_string()
}
