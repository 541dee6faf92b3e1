//! Entry point for the group chat CLI.

use clap::Parser;
use cli::Cli;
use dotenv::dotenv;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    cli::run(Cli::parse()).await
}
