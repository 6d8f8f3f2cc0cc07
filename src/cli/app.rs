use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use super::commands::Commands;
use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{init_logging, load_config, load_local_env_overrides, LoadedConfig};

pub async fn run() -> Result<()> {
    load_local_env_overrides();
    let cli = CliArgs::parse();

    init_logging(&cli.log_level, cli.debug)?;
    info!("Starting element-hider v{}", env!("CARGO_PKG_VERSION"));

    let LoadedConfig { config, path } = load_config(cli.config.as_ref()).await?;
    // `config show|validate` must still run against a broken file.
    if !matches!(cli.command, Commands::Config(_)) {
        config.validate()?;
    }
    let cli_context = CliContext::new(config, path, cli.output);

    match dispatch(&cli, &cli_context).await {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
