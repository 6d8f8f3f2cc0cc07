use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    element_hider_cli::cli::app::run().await
}
