// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Receiver HTTP server
//!
//! Loads configuration and the root CA, wires the application services and
//! serves the API until Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use agent_receiver_core::application::{DataIngestGate, IdentityResolver, PairingService, RegistrationWorkflow};
use agent_receiver_core::domain::identity::Credentials;
use agent_receiver_core::domain::receiver_config::ReceiverConfig;
use agent_receiver_core::infrastructure::{
    AgentOutputStore, CertificateAuthority, FilesystemRegistrationStore, RestInventoryClient,
};
use agent_receiver_core::presentation::{app, AppState};

pub async fn start_server(config_path: Option<PathBuf>) -> Result<()> {
    let config = ReceiverConfig::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    info!(
        "Configuration loaded: name={}, site={}",
        config.metadata.name, config.spec.site
    );

    if let Some(port) = config.spec.metrics_port {
        install_metrics_exporter(&config.spec.server.host, port)?;
    }

    let app = build_app(&config)?;

    let addr = format!("{}:{}", config.spec.server.host, config.spec.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Agent receiver listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Agent receiver shutting down");

    Ok(())
}

/// Wire the services described by `config` into the HTTP router
pub fn build_app(config: &ReceiverConfig) -> Result<Router> {
    let spec = &config.spec;

    let ca = Arc::new(
        CertificateAuthority::load_root(&spec.paths.root_ca)
            .with_context(|| format!("Failed to load root CA from {:?}", spec.paths.root_ca))?,
    );

    let secret = spec.inventory.resolve_secret()?;
    if secret.is_none() {
        warn!(
            "No inventory secret configured; automation calls as '{}' will likely be rejected",
            spec.inventory.username
        );
    }
    let automation = Credentials::new(spec.inventory.username.clone(), secret.unwrap_or_default());
    let inventory = Arc::new(
        RestInventoryClient::new(&spec.inventory.url, spec.inventory.timeout(), automation)
            .context("Failed to create inventory client")?,
    );

    let store = Arc::new(FilesystemRegistrationStore::new(&spec.paths.registration_root));
    let output = Arc::new(AgentOutputStore::new(&spec.paths.data_root));
    let resolver = Arc::new(IdentityResolver::new(inventory.clone()));

    let state = AppState {
        pairing: Arc::new(PairingService::new(ca.clone(), inventory.clone())),
        workflow: Arc::new(RegistrationWorkflow::new(
            ca,
            inventory,
            resolver.clone(),
            store.clone(),
            spec.site.clone(),
        )),
        ingest: Arc::new(DataIngestGate::new(
            resolver,
            store,
            output,
            spec.ingest.max_decompressed_bytes,
        )),
        retry_after_secs: spec.retry_after_secs,
        start_time: Instant::now(),
    };

    Ok(app(state, spec.server.max_body_bytes))
}

fn install_metrics_exporter(host: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid metrics listen address {}:{}", host, port))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!("Prometheus metrics on {}", addr);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
