// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use agent_receiver_core::domain::receiver_config::{ReceiverConfig, CONFIG_PATH_ENV};

pub const MINIMAL_TEMPLATE: &str = include_str!("../../templates/config-minimal.yaml");
pub const EXAMPLES_TEMPLATE: &str = include_str!("../../templates/config-with-examples.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective configuration as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./agent-receiver.yaml)
        #[arg(short, long, default_value = "./agent-receiver.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = ReceiverConfig::load_or_default(config_override.clone()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./agent-receiver.yaml");
        println!("  4. ~/.agent-receiver/config.yaml");
        println!("  5. /etc/agent-receiver/config.yaml");
        println!();
    }

    if as_yaml {
        print!("{}", config.to_yaml_string()?);
        return Ok(());
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Receiver:".bold());
    println!("  Name: {}", config.metadata.name);
    if spec.site.is_empty() {
        println!("  Site: {}", "(not set)".red());
    } else {
        println!("  Site: {}", spec.site);
    }
    println!("  Listen: {}:{}", spec.server.host, spec.server.port);
    println!("  Max body: {} bytes", spec.server.max_body_bytes);
    println!();

    println!("{}", "Paths:".bold());
    println!("  Root CA: {}", spec.paths.root_ca.display());
    println!("  Registrations: {}", spec.paths.registration_root.display());
    println!("  Agent data: {}", spec.paths.data_root.display());
    println!();

    println!("{}", "Inventory:".bold());
    println!("  URL: {}", spec.inventory.url);
    println!("  Timeout: {}s", spec.inventory.timeout_secs);
    println!("  Automation user: {}", spec.inventory.username);
    println!(
        "  Secret: {}",
        if spec.inventory.secret.is_some() { "(configured)" } else { "(none)" }
    );
    println!();

    println!("{}", "Operations:".bold());
    println!("  Max decompressed output: {} bytes", spec.ingest.max_decompressed_bytes);
    println!("  Retry-After: {}s", spec.retry_after_secs);
    match spec.metrics_port {
        Some(port) => println!("  Metrics: :{}", port),
        None => println!("  Metrics: {}", "(disabled)".dimmed()),
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = ReceiverConfig::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples { EXAMPLES_TEMPLATE } else { MINIMAL_TEMPLATE };

    std::fs::write(&output, sample).with_context(|| format!("Failed to write config to {:?}", output))?;

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());

    Ok(())
}
