// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Inventory Service Trait - Anti-Corruption Layer for the upstream site
//!
//! The upstream monitoring site owns the host inventory: which hostnames
//! exist, which site monitors them, how they connect and which agent
//! identity is linked to them. It also holds the site CA used for pairing.
//! This trait isolates the receiver from the concrete REST API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::identity::{AgentIdentity, ConnectionMode, Credentials};

/// Host object as configured upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Site monitoring the host
    pub site: String,

    /// Cluster containers must register their nodes instead
    #[serde(default)]
    pub is_cluster: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditionCapabilities {
    pub supports_label_registration: bool,
}

/// Certificate lifetime policy for one identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningPolicy {
    pub validity_months: u32,
}

/// Upstream view of an identity's host linkage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostLink {
    pub linked: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_mode: Option<ConnectionMode>,
}

/// Operations the receiver consumes from the upstream inventory.
///
/// Calls made on behalf of a user carry that user's credentials so the
/// upstream can enforce its own permissions.
#[async_trait]
pub trait InventoryService: Send + Sync {
    async fn get_host_config(
        &self,
        credentials: &Credentials,
        hostname: &str,
    ) -> Result<HostConfig, InventoryError>;

    async fn link_host(
        &self,
        credentials: &Credentials,
        hostname: &str,
        identity: AgentIdentity,
    ) -> Result<(), InventoryError>;

    async fn get_edition_capabilities(
        &self,
        credentials: &Credentials,
    ) -> Result<EditionCapabilities, InventoryError>;

    async fn get_signing_policy(&self, identity: AgentIdentity) -> Result<SigningPolicy, InventoryError>;

    async fn is_host_linked(&self, identity: AgentIdentity) -> Result<HostLink, InventoryError>;

    /// Sign a CSR with the site CA (pairing only)
    async fn sign_csr(&self, credentials: &Credentials, csr_pem: &str) -> Result<String, InventoryError>;

    /// Site root certificate in PEM (pairing only)
    async fn get_root_certificate(&self, credentials: &Credentials) -> Result<String, InventoryError>;
}

#[derive(Debug, Clone, Error)]
pub enum InventoryError {
    /// Unreachable, timed out, 5xx or unreadable reply
    #[error("upstream inventory unavailable: {0}")]
    Unavailable(String),

    #[error("upstream rejected credentials: {0}")]
    Unauthorized(String),

    #[error("not found upstream: {0}")]
    NotFound(String),

    #[error("upstream rejected request: {0}")]
    Rejected(String),
}
