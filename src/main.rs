mod auth;
mod cli;
mod config;
mod error;
mod monitor;
mod output;
mod providers;
mod viewer;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting pipewatch - GitLab Pipeline Monitor");
    cli.execute().await?;

    Ok(())
}
