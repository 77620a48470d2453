//! paperscout CLI — conference-paper metadata aggregation and search.
//!
//! Fetches yearly paper listings from two upstream catalogs, reconciles
//! them into enriched per-paper datasets, and runs cached model judgments
//! (relevance filtering, keyword extraction) over them.

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
