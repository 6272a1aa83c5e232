//! Duels+ Launcher - desktop front-end for the Duels+ proxy
//!
//! Entry point for CLI and GUI modes.

mod cli;
mod gui;

use anyhow::Context;
use clap::Parser;
use cli::Args;
use duelsplus_launcher::config;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = Args::parse();

    // Initialize logging. RUST_LOG wins over --verbose.
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("duelsplus_launcher={},warn", default_level))
    });
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    let config = config::load().context("Failed to load launcher config")?;

    // Handle subcommands first
    if let Some(command) = args.command.take() {
        let backend = cli::connect(&args, &config).await?;
        return cli::handle_command(command, backend).await;
    }

    // GUI mode: Start the launcher UI
    tracing::info!("Starting Duels+ Launcher GUI");
    let backend = cli::connect_or_offline(&args, &config).await;
    gui::run(backend, config)
}
