// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Server mode
//!
//! Handles:
//! - Service wiring and the HTTP listener
//! - HTTP health checks against a running receiver
//! - Graceful shutdown

use anyhow::Result;
use std::time::Duration;

pub mod server;

pub use server::{build_app, start_server};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverStatus {
    Running { uptime: Option<u64> },
    Unhealthy { error: String },
    Stopped,
}

/// Base URL for a receiver listening on `host:port`
pub fn base_url(host: &str, port: u16) -> String {
    // A wildcard bind is reachable locally
    let host = match host {
        "0.0.0.0" | "::" | "[::]" => "127.0.0.1",
        other => other,
    };
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}:{}", host, port)
    } else {
        format!("http://{}:{}", host, port)
    }
}

/// Check a receiver via its `/health` route
pub async fn check_receiver(base_url: &str, timeout: Duration) -> Result<ReceiverStatus> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let health_url = format!("{}/health", base_url.trim_end_matches('/'));

    match client.get(&health_url).send().await {
        Ok(resp) if resp.status().is_success() => {
            let uptime = resp
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v["uptime_seconds"].as_u64());
            Ok(ReceiverStatus::Running { uptime })
        }
        Ok(resp) => Ok(ReceiverStatus::Unhealthy {
            error: format!("HTTP {}", resp.status()),
        }),
        Err(e) if e.is_connect() => Ok(ReceiverStatus::Stopped),
        Err(e) => Ok(ReceiverStatus::Unhealthy { error: e.to_string() }),
    }
}
