use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use hider_core_types::RuleSet;
use rule_store::{load_rule_set, RuleStore, StorePatch};
use tracing::info;

use super::context::CliContext;
use super::output::print_structured;

#[derive(Args, Clone, Debug)]
pub struct RulesArgs {
    /// Rule store file
    #[arg(long, value_name = "FILE", global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub action: RulesAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum RulesAction {
    /// Print the hidden classes and ids
    Show,

    /// Remove every hidden class and id
    Clear,
}

pub async fn cmd_rules(args: RulesArgs, ctx: &CliContext) -> Result<()> {
    let store = ctx.open_store(args.store.as_deref());
    match args.action {
        RulesAction::Show => {
            let rules = load_rule_set(store.as_ref())
                .await
                .context("Failed to read the rule store")?;
            if !print_structured(ctx.output(), &rules)? {
                print_rules(&rules);
            }
        }
        RulesAction::Clear => {
            let before = load_rule_set(store.as_ref())
                .await
                .context("Failed to read the rule store")?;
            store
                .set(StorePatch::from(&RuleSet::default()))
                .await
                .context("Failed to write the rule store")?;
            info!(cleared = before.len(), "rules cleared");
            println!("Cleared {} rule(s)", before.len());
        }
    }
    Ok(())
}

fn print_rules(rules: &RuleSet) {
    if rules.is_empty() {
        println!("No hidden classes or ids");
        return;
    }
    for rule in rules.rules() {
        println!("{rule}");
    }
}
