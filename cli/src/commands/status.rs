// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Health check of a running receiver

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

use agent_receiver_core::domain::receiver_config::ReceiverConfig;

use crate::daemon::{base_url, check_receiver, ReceiverStatus};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn handle_command(url: Option<String>, config_override: Option<PathBuf>) -> Result<()> {
    let url = match url {
        Some(url) => url,
        None => {
            let config = ReceiverConfig::load_or_default(config_override).context("Failed to load configuration")?;
            base_url(&config.spec.server.host, config.spec.server.port)
        }
    };

    match check_receiver(&url, HEALTH_TIMEOUT).await {
        Ok(ReceiverStatus::Running { uptime }) => {
            println!("{}", "✓ Receiver is running".green());
            println!("  URL: {}", url);
            if let Some(uptime) = uptime {
                println!("  Uptime: {}", format_duration(uptime));
            }
            Ok(())
        }
        Ok(ReceiverStatus::Stopped) => {
            println!("{}", format!("✗ Receiver is not running at {}", url).red());
            anyhow::bail!("Receiver not reachable")
        }
        Ok(ReceiverStatus::Unhealthy { error }) => {
            println!("{}", format!("⚠ Receiver unhealthy at {}", url).yellow());
            println!("  Health check failed: {}", error);
            anyhow::bail!("Receiver unhealthy")
        }
        Err(e) => {
            println!("{}", format!("✗ Failed to check status: {}", e).red());
            Err(e)
        }
    }
}

fn format_duration(seconds: u64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}
