//! paperkg CLI - extract knowledge graphs from research papers.

use anyhow::Context;
use clap::Parser;
use paperkg_cli::commands;
use paperkg_cli::{Cli, Command, Config, Formatter};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Diagnostics go to stderr; stdout carries command output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    let format = cli
        .format
        .map(Into::into)
        .unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter = Formatter::new(format, color_enabled);

    match cli.command {
        Command::Extract(args) => {
            commands::execute_extract(args, &mut config, &formatter).await?;
        }
        Command::Plan(args) => {
            commands::execute_plan(args, &mut config, &formatter)?;
        }
        Command::Stats(args) => {
            commands::execute_stats(args, &mut config, &formatter)?;
        }
    }

    Ok(())
}
