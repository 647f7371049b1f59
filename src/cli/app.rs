use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::init_logging;
use crate::config::{AppConfig, LoadedConfig};

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    let LoadedConfig { config, path } = AppConfig::load(cli.config.as_deref())?;
    let level = cli.log_level.as_deref().unwrap_or(&config.log.level);
    let format = cli.log_format.unwrap_or(config.log.format);
    init_logging(level, cli.debug, format)?;

    info!("Starting politecrawl v{}", env!("CARGO_PKG_VERSION"));
    match &path {
        Some(path) => info!("Loaded configuration from: {}", path.display()),
        None => info!("No config file found, using defaults and environment"),
    }

    let cli_context = CliContext::new(config, path);

    match dispatch(&cli, &cli_context).await {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {}", err);
            Err(err)
        }
    }
}
