pub mod args;
pub mod commands;
mod export;

use crate::config::GemsieveConfig;
use crate::error::AppResult;
use args::Cli;
use clap::Parser;

/// Parses argv, loads config (honoring `--config`), and dispatches to the
/// matched verb's handler (§6.1).
pub async fn run() -> AppResult<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => GemsieveConfig::load_from(std::path::Path::new(path))?,
        None => GemsieveConfig::load()?,
    };
    commands::dispatch(cli.command, config).await
}
