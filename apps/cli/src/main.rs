//! warpcrawler CLI — mirror a Wayback Machine snapshot and publish it.
//!
//! `crawl` bootstraps and runs the crawler, passing its exit code through;
//! `publish` commits the mirror and force-pushes it to a git remote.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);

    let code = commands::run(cli).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
