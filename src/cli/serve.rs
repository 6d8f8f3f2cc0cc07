use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use enforcement_agent::{CommandRouter, EnforcementAgent};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{debug, info};

use super::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Page fixture (JSON element tree)
    #[arg(long, value_name = "FILE")]
    pub page: PathBuf,

    /// Rule store file
    #[arg(long, value_name = "FILE")]
    pub store: Option<PathBuf>,
}

/// One JSON request per stdin line, one JSON response per stdout line. Stops
/// at end of input or on Ctrl+C.
pub async fn cmd_serve(args: ServeArgs, ctx: &CliContext) -> Result<()> {
    let document = ctx.load_page(&args.page)?;
    let store = ctx.open_store(args.store.as_deref());
    let agent = EnforcementAgent::start(document, store, ctx.config().agent.clone())
        .await
        .context("Failed to start the enforcement agent")?;
    let router = CommandRouter::new(agent.clone());
    info!(page = %args.page.display(), "serving requests on stdin");

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let response = router.handle_line(&line).await;
                debug!(success = response.is_success(), "request answered");
                let mut encoded = serde_json::to_vec(&response)?;
                encoded.push(b'\n');
                stdout.write_all(&encoded).await?;
                stdout.flush().await?;
            }
            _ = signal::ctrl_c() => {
                info!("serve stopped by user");
                break;
            }
        }
    }

    agent.shutdown().await;
    info!(metrics = ?agent.metrics(), "serve finished");
    Ok(())
}
