//! Command-Line Interface (CLI) argument parsing.
//!
//! Global settings flags are merged into `AppConfig` through the figment
//! `Provider` implementation on [`SettingsArgs`]; subcommands select what the
//! binary does with the loaded configuration.

use clap::{Args, Parser, Subcommand};
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Resolve output credentials and dispatch alerts to configured destinations.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub settings: SettingsArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags that override values from the configuration file and environment.
#[derive(Args, Debug, Default, Clone)]
pub struct SettingsArgs {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Region of the secret backends.
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Raw deployment qualifier used to scope the secrets bucket.
    #[arg(long, global = true)]
    pub qualifier: Option<String>,

    /// Directory for cached credential blobs.
    #[arg(long, value_name = "DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Path of the outputs configuration document.
    #[arg(long, value_name = "FILE", global = true)]
    pub outputs_config: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset.
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Send one alert to a configured output.
    Dispatch {
        /// Output to use, as `service:descriptor`.
        #[arg(long)]
        output: String,
        /// Name of the rule that produced the alert.
        #[arg(long)]
        rule: String,
        /// JSON file containing the alert payload.
        #[arg(long, value_name = "FILE")]
        alert: PathBuf,
    },
    /// Add a descriptor to the outputs configuration.
    Register {
        #[arg(long)]
        service: String,
        #[arg(long)]
        descriptor: String,
    },
    /// List the properties an operator must supply for a service.
    Properties {
        #[arg(long)]
        service: String,
    },
}

/// Splits a `service:descriptor` output reference.
pub fn parse_output(output: &str) -> Option<(&str, &str)> {
    match output.split_once(':') {
        Some((service, descriptor))
            if !service.is_empty() && !descriptor.is_empty() && !descriptor.contains(':') =>
        {
            Some((service, descriptor))
        }
        _ => None,
    }
}

impl Provider for SettingsArgs {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(region) = &self.region {
            dict.insert("region".into(), Value::from(region.clone()));
        }
        if let Some(qualifier) = &self.qualifier {
            dict.insert("qualifier".into(), Value::from(qualifier.clone()));
        }
        if let Some(dir) = &self.cache_dir {
            dict.insert("cache_dir".into(), Value::from(dir.display().to_string()));
        }
        if let Some(path) = &self.outputs_config {
            dict.insert("outputs_config".into(), Value::from(path.display().to_string()));
        }
        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
