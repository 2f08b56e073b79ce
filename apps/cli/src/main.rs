//! mdharvest CLI: save web articles as Markdown in per-domain folders.
//!
//! Each domain folder keeps a `meta.csv` ledger so reruns only fetch what is
//! still missing.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
