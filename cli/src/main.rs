// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Booner CLI
//!
//! The `booner` binary turns natural-language homelab requests into
//! dispatched infrastructure actions.
//!
//! ## Commands
//!
//! - `booner serve` - HTTP task API plus background maintenance
//! - `booner ask <text>` - run a single request in-process
//! - `booner interactive` - request prompt until `quit`/`exit`
//! - `booner config show|validate|generate` - configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod embedded;

use commands::ConfigCommand;

/// Booner - natural-language homelab orchestration
#[derive(Parser)]
#[command(name = "booner")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "BOONER_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "BOONER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API with health monitoring and context pruning
    #[command(name = "serve")]
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        host: Option<String>,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Handle one request and print the outcome
    #[command(name = "ask")]
    Ask {
        /// The request, e.g. "open port 25565 for the minecraft server"
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Prompt for requests until "quit" or "exit"
    #[command(name = "interactive")]
    Interactive,

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal outside development.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Serve { host, port } => commands::serve::execute(cli.config, host, port).await,
        Commands::Ask { text, json } => commands::ask::execute(cli.config, text.join(" "), json).await,
        Commands::Interactive => commands::interactive::execute(cli.config).await,
        Commands::Config { command } => commands::config::handle_command(command, cli.config).await,
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
