use anyhow::Result;
use apisim_cli::{init_logging, run, Cli};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);
    run(cli).await
}
