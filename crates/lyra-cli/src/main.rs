//! Lyra CLI - the main entry point for the `lyra` binary.

use anyhow::Result;
use clap::Parser;

use lyra_cli::Cli;
use lyra_core::observability;

fn main() -> Result<()> {
    let cli = Cli::parse();
    observability::init_logging(cli.log_format.into());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        lyra_cli::execute(&cli).await?;
        Ok(())
    })
}
