use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration
    Validate,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    let path = ctx.config_path();
    match args.action {
        ConfigAction::Show => {
            println!("# Current configuration ({})", path.display());
            print!("{}", serde_yaml::to_string(ctx.config())?);
        }
        ConfigAction::Validate => {
            ctx.config().validate()?;
            println!("Configuration is valid ({})", path.display());
        }
    }
    Ok(())
}
