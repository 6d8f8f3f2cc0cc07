use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use enforcement_agent::EnforcementAgent;
use page_dom::Document;
use tracing::{info, warn};

use super::context::CliContext;
use super::output::print_structured;
use super::report::{page_report, print_page_report};

#[derive(Args, Clone, Debug)]
pub struct ApplyArgs {
    /// Page fixture (JSON element tree)
    #[arg(long, value_name = "FILE")]
    pub page: PathBuf,

    /// Rule store file
    #[arg(long, value_name = "FILE")]
    pub store: Option<PathBuf>,

    /// Hide a class before reporting (repeatable, persisted)
    #[arg(long = "hide-class", value_name = "CLASS")]
    pub hide_class: Vec<String>,

    /// Hide an id before reporting (repeatable, persisted)
    #[arg(long = "hide-id", value_name = "ID")]
    pub hide_id: Vec<String>,
}

pub async fn cmd_apply(args: ApplyArgs, ctx: &CliContext) -> Result<()> {
    let document = ctx.load_page(&args.page)?;
    let store = ctx.open_store(args.store.as_deref());
    let agent = EnforcementAgent::start(document.clone(), store, ctx.config().agent.clone())
        .await
        .context("Failed to start the enforcement agent")?;

    for class_name in &args.hide_class {
        if document.elements_by_class(class_name).is_empty() {
            warn!(%class_name, "no element carries this class yet; the rule applies on insertion");
        }
        agent
            .hide_class(class_name)
            .await
            .with_context(|| format!("Failed to hide class {class_name}"))?;
    }
    for id in &args.hide_id {
        if document.element_by_id(id).is_none() {
            warn!(%id, "no element carries this id yet; the rule applies on insertion");
        }
        agent
            .hide_id(id)
            .await
            .with_context(|| format!("Failed to hide id {id}"))?;
    }

    let report = page_report(&document);
    agent.shutdown().await;
    info!(metrics = ?agent.metrics(), "apply finished");

    if !print_structured(ctx.output(), &report)? {
        print_page_report(&report);
    }
    Ok(())
}
