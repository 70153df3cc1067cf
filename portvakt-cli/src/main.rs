//! ## portvakt-cli
//! **Operational interface for the Portvakt failure monitor**
//!
//! `portvakt run` watches live traffic on the configured port and blocks
//! addresses that keep failing authentication; `portvakt replay` pushes a
//! saved capture through the same pipeline.

use clap::Parser;

mod commands;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    commands::run_command(cli).await
}
