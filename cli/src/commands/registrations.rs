// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Registration inspection commands
//!
//! Read-only views of the label registration queue for administrators.
//! Moving records between states is left to the site's review tooling.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use agent_receiver_core::domain::identity::AgentIdentity;
use agent_receiver_core::domain::receiver_config::ReceiverConfig;
use agent_receiver_core::domain::registration::{RegistrationRecord, RegistrationState, RegistrationStore};
use agent_receiver_core::infrastructure::FilesystemRegistrationStore;

#[derive(Subcommand)]
pub enum RegistrationsCommand {
    /// List registrations in one state
    List {
        /// NEW, PENDING, DECLINED, READY or DISCOVERABLE
        #[arg(long, default_value = "NEW")]
        state: RegistrationState,

        /// Print records as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Show one registration
    Show {
        /// Agent UUID
        uuid: String,
    },
}

pub async fn handle_command(command: RegistrationsCommand, config_override: Option<PathBuf>) -> Result<()> {
    let config = ReceiverConfig::load_or_default(config_override).context("Failed to load configuration")?;
    let store = FilesystemRegistrationStore::new(&config.spec.paths.registration_root);

    match command {
        RegistrationsCommand::List { state, json } => list(&store, state, json),
        RegistrationsCommand::Show { uuid } => show(&store, &uuid).await,
    }
}

fn list(store: &FilesystemRegistrationStore, state: RegistrationState, json: bool) -> Result<()> {
    let records = store
        .list_by_state(state)
        .with_context(|| format!("Failed to list {} registrations", state))?;

    let mut count = 0;
    for record in records {
        let record = record.with_context(|| format!("Failed to read {} registration", state))?;
        if json {
            println!("{}", serde_json::to_string(&record)?);
        } else {
            print_summary(&record);
        }
        count += 1;
    }

    if !json {
        println!();
        println!("{} registration(s) in {}", count, state.to_string().bold());
    }
    Ok(())
}

async fn show(store: &FilesystemRegistrationStore, uuid: &str) -> Result<()> {
    let identity = AgentIdentity::from_string(uuid).with_context(|| format!("Invalid agent UUID '{}'", uuid))?;

    match store.get(identity).await.context("Failed to read registration")? {
        Some(stored) => {
            println!("{}", format!("Registration {}", identity).bold());
            println!("  State: {}", stored.state);
            println!("  Submitted by: {}", stored.record.username);
            if let Some(message) = &stored.record.message {
                println!("  Message: {}", message);
            }
            if stored.record.csr.is_some() {
                println!("  CSR: held until approval");
            }
            if stored.record.agent_labels.is_empty() {
                println!("  Labels: {}", "(none)".dimmed());
            } else {
                println!("  Labels:");
                for (key, value) in &stored.record.agent_labels {
                    println!("    {}: {}", key, value);
                }
            }
            Ok(())
        }
        None => {
            println!("{}", format!("✗ No registration for {}", identity).red());
            anyhow::bail!("Registration not found")
        }
    }
}

fn print_summary(record: &RegistrationRecord) {
    let labels = record
        .agent_labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",");
    println!("  {}  {}  {}", record.uuid, record.username, labels.dimmed());
}
