use super::apply::cmd_apply;
use super::config::cmd_config;
use super::env::CliArgs;
use super::init::cmd_init;
use super::rules::cmd_rules;
use super::serve::cmd_serve;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Init(args) => cmd_init(args, ctx).await,
        Commands::Rules(args) => cmd_rules(args, ctx).await,
        Commands::Apply(args) => cmd_apply(args, ctx).await,
        Commands::Serve(args) => cmd_serve(args, ctx).await,
        Commands::Config(args) => cmd_config(args, ctx).await,
    }
}
