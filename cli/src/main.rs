// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Agent Receiver
//!
//! The `agent-receiver` binary serves the agent bootstrap API and offers a
//! few administrative commands on the same configuration.
//!
//! ## Commands
//!
//! - `agent-receiver serve` - Run the HTTP API until Ctrl+C/SIGTERM
//! - `agent-receiver status` - Health check a running receiver
//! - `agent-receiver config show|validate|generate` - Configuration management
//! - `agent-receiver registrations list|show` - Inspect label registrations

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use agent_receiver::commands::{self, ConfigCommand, RegistrationsCommand};
use agent_receiver::daemon;

/// Agent Receiver - Certificate signing and data intake for monitoring agents
#[derive(Parser)]
#[command(name = "agent-receiver")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "AGENT_RECEIVER_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "AGENT_RECEIVER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, env = "AGENT_RECEIVER_LOG_FORMAT", value_enum, default_value = "compact")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Compact,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the receiver HTTP API
    #[command(name = "serve")]
    Serve,

    /// Check whether a receiver is up
    #[command(name = "status")]
    Status {
        /// Receiver base URL (default: derived from configuration)
        #[arg(long, value_name = "URL")]
        url: Option<String>,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Inspect label registrations on disk
    #[command(name = "registrations")]
    Registrations {
        #[command(subcommand)]
        command: RegistrationsCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_format)?;

    match cli.command {
        Some(Commands::Serve) => daemon::start_server(cli.config).await,
        Some(Commands::Status { url }) => commands::status::handle_command(url, cli.config).await,
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        Some(Commands::Registrations { command }) => {
            commands::registrations::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    // Targets stay visible so `audit` events can be told apart
    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}
