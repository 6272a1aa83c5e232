//! CLI argument definitions
//!
//! Uses clap derive macros for argument parsing.

use clap::{Parser, Subcommand};
use duelsplus_launcher::core::logs::LogLevel;

/// Duels+ Launcher - launch and manage the Duels+ proxy
#[derive(Parser, Debug)]
#[command(name = "duelsplus-launcher")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Backend address (overrides the config file)
    #[arg(short, long)]
    pub bridge: Option<String>,

    /// Use the built-in simulated backend
    #[arg(long)]
    pub demo: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show proxy and API status
    Status,

    /// Launch the proxy and follow it until it runs
    Launch {
        /// Local port (defaults to the configured proxy port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Stop the proxy
    Stop,

    /// Follow proxy logs
    Logs {
        /// Only show these levels (debug, info, warn, error)
        #[arg(short, long, value_delimiter = ',')]
        level: Vec<LogLevel>,

        /// Strip colours
        #[arg(long)]
        plain: bool,
    },

    /// Read or change proxy settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// List proxy releases
    Releases {
        /// Include beta releases
        #[arg(long)]
        beta: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print one setting, or all of them
    Get { key: Option<String> },
    /// Change a setting
    Set { key: String, value: String },
}
