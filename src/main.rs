//! Alert dispatch command-line entry point.

use alert_dispatch::{
    aws::build_backends,
    cli::{parse_output, Cli, Command},
    config::{AppConfig, OutputsConfig},
    core::PropertySchema,
    outputs::get_output_dispatcher,
    SecretBackends,
};
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::fs;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.settings).context("failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        region = %config.region,
        qualifier = %config.qualifier,
        cache_dir = %config.cache_root().display(),
        outputs_config = %config.outputs_config.display(),
        "configuration loaded"
    );

    match cli.command {
        Command::Dispatch { output, rule, alert } => {
            let (service, descriptor) = parse_output(&output).ok_or_else(|| {
                anyhow!(
                    "outputs must be declared with both a service and a descriptor (ie: 'slack:my_channel'), got '{}'",
                    output
                )
            })?;
            let outputs = OutputsConfig::load(&config.outputs_config)?;
            if !outputs.contains(service, descriptor) {
                bail!("the output {} does not exist", output);
            }

            let raw = fs::read_to_string(&alert)
                .with_context(|| format!("failed to read alert {}", alert.display()))?;
            let payload: serde_json::Value = serde_json::from_str(&raw)
                .with_context(|| format!("failed to decode alert {}", alert.display()))?;

            let dispatcher = get_output_dispatcher(service, &config.region, &config.qualifier, &backends(&config))
                .ok_or_else(|| anyhow!("unknown output service '{}'", service))?;
            if !dispatcher.dispatch(descriptor, &rule, &payload) {
                error!(output = %output, rule = %rule, "alert was not delivered");
                std::process::exit(1);
            }
        }
        Command::Register { service, descriptor } => {
            let dispatcher = get_output_dispatcher(&service, &config.region, &config.qualifier, &backends(&config))
                .ok_or_else(|| anyhow!("unknown output service '{}'", service))?;

            let mut outputs = if config.outputs_config.exists() {
                OutputsConfig::load(&config.outputs_config)?
            } else {
                OutputsConfig::default()
            };
            if outputs.contains(dispatcher.config_service_name(), &descriptor) {
                bail!("descriptor '{}' is already configured for {}", descriptor, service);
            }

            let props = fill_descriptor(dispatcher.user_defined_properties(), &descriptor);
            let descriptors = dispatcher.format_output_config(&outputs, &props);
            outputs.insert(dispatcher.config_service_name(), descriptors);
            outputs.save(&config.outputs_config)?;
            info!(service = %service, descriptor = %descriptor, "output registered");
        }
        Command::Properties { service } => {
            let dispatcher = get_output_dispatcher(&service, &config.region, &config.qualifier, &backends(&config))
                .ok_or_else(|| anyhow!("unknown output service '{}'", service))?;
            for (name, property) in dispatcher.user_defined_properties().iter() {
                let mut flags = Vec::new();
                if property.is_secret {
                    flags.push("secret");
                }
                if property.cred_requirement {
                    flags.push("required");
                }
                println!("{:<16} {:<18} {}", name, flags.join(","), property.description);
            }
        }
    }

    Ok(())
}

fn backends(config: &AppConfig) -> SecretBackends {
    build_backends(&config.region, &config.aws, config.cache_root())
}

fn fill_descriptor(schema: PropertySchema, descriptor: &str) -> PropertySchema {
    let property = schema
        .get("descriptor")
        .cloned()
        .unwrap_or_default()
        .with_value(descriptor);
    schema.with("descriptor", property)
}
