//! Configuration management for alert dispatch
//!
//! `AppConfig` holds the process settings and is layered by `figment` from
//! defaults, an optional TOML file, `ALERT_DISPATCH_` environment variables
//! and command-line flags. `OutputsConfig` is the persisted JSON document
//! listing the descriptors configured for each output service.

use crate::cli::SettingsArgs;
use crate::credentials::default_cache_root;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    /// The logging level, used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Region the secret backends live in.
    pub region: String,
    /// Raw deployment qualifier, e.g. `prod_streamalert_alert_processor`.
    pub qualifier: String,
    /// Directory for cached credential blobs. Defaults to a folder in the system temp dir.
    pub cache_dir: Option<PathBuf>,
    /// Path of the outputs configuration document.
    pub outputs_config: PathBuf,
    /// Endpoint overrides for the AWS clients.
    #[serde(default)]
    pub aws: AwsConfig,
}

/// Endpoint overrides for the AWS clients, e.g. for a local emulator.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct AwsConfig {
    pub s3_endpoint: Option<String>,
    pub kms_endpoint: Option<String>,
}

impl AppConfig {
    /// Loads the configuration, layering defaults, file, environment, and CLI flags.
    pub fn load(args: &SettingsArgs) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Some(path) = &args.config {
            figment = figment.merge(Toml::file(path));
        }
        let config: AppConfig = figment
            // e.g. ALERT_DISPATCH_REGION=eu-west-1 or ALERT_DISPATCH_AWS__S3_ENDPOINT=...
            .merge(Env::prefixed("ALERT_DISPATCH_").split("__"))
            .merge(args.clone())
            .extract()?;
        Ok(config)
    }

    /// The credential cache root, falling back to the process-wide default.
    pub fn cache_root(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_root)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            region: "us-east-1".to_string(),
            qualifier: "streamalert_alert_processor".to_string(),
            cache_dir: None,
            outputs_config: PathBuf::from("conf/outputs.json"),
            aws: AwsConfig::default(),
        }
    }
}

/// Descriptors configured per output service, keyed by config-service name.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct OutputsConfig {
    services: BTreeMap<String, Vec<String>>,
}

impl OutputsConfig {
    /// Reads the outputs document from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read outputs config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse outputs config {}", path.display()))
    }

    /// Writes the outputs document to `path`, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let rendered = serde_json::to_string_pretty(self)?;
        fs::write(path, rendered + "\n")
            .with_context(|| format!("failed to write outputs config {}", path.display()))
    }

    /// The descriptors for `service`, empty if none are configured.
    pub fn descriptors(&self, service: &str) -> &[String] {
        self.services.get(service).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, service: &str, descriptor: &str) -> bool {
        self.descriptors(service).iter().any(|d| d == descriptor)
    }

    /// Replaces the descriptor list stored for `service`.
    pub fn insert(&mut self, service: impl Into<String>, descriptors: Vec<String>) {
        self.services.insert(service.into(), descriptors);
    }

    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }
}
