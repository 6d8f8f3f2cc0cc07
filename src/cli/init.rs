use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use rule_store::seed_defaults;
use serde_json::json;

use super::context::CliContext;
use super::output::print_structured;

#[derive(Args, Clone, Debug)]
pub struct InitArgs {
    /// Rule store file
    #[arg(long, value_name = "FILE")]
    pub store: Option<PathBuf>,
}

pub async fn cmd_init(args: InitArgs, ctx: &CliContext) -> Result<()> {
    let store = ctx.open_store(args.store.as_deref());
    let outcome = seed_defaults(store.as_ref())
        .await
        .context("Failed to seed the rule store")?;
    let seeded: Vec<&str> = outcome.seeded.iter().map(|key| key.as_str()).collect();

    if !print_structured(ctx.output(), &json!({ "seeded": seeded }))? {
        if seeded.is_empty() {
            println!("Rule store already initialized");
        } else {
            println!("Seeded empty lists: {}", seeded.join(", "));
        }
    }
    Ok(())
}
