// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pairing Use Case
//!
//! First contact between a freshly installed agent and the site. An
//! authenticated user hands over the agent's CSR and gets back:
//!
//! 1. the site root certificate (so the agent can trust the site), and
//! 2. a client certificate issued by the **site** CA via the upstream.
//!
//! The receiver's own CA is not involved here; it only issues renewals.
//! Both artifacts are returned or neither, and no registration record is
//! created.

use serde::Serialize;
use std::sync::Arc;

use crate::application::verified_common_name;
use crate::domain::error::ReceiverError;
use crate::domain::identity::{AgentIdentity, Credentials};
use crate::domain::inventory::InventoryService;
use crate::infrastructure::certificate_authority::CertificateAuthority;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairingResult {
    pub root_cert: String,
    pub client_cert: String,
}

pub struct PairingService {
    ca: Arc<CertificateAuthority>,
    inventory: Arc<dyn InventoryService>,
}

impl PairingService {
    pub fn new(ca: Arc<CertificateAuthority>, inventory: Arc<dyn InventoryService>) -> Self {
        Self { ca, inventory }
    }

    pub async fn pair(&self, credentials: &Credentials, csr_pem: &str) -> Result<PairingResult, ReceiverError> {
        // Reject junk before bothering the upstream
        let common_name = verified_common_name(&self.ca, csr_pem)?;
        let identity = AgentIdentity::from_string(&common_name).map_err(|_| {
            ReceiverError::MalformedCsr(format!("common name '{}' is not a UUID", common_name))
        })?;

        let root_cert = self.inventory.get_root_certificate(credentials).await?;
        let client_cert = self.inventory.sign_csr(credentials, csr_pem).await?;

        tracing::info!(
            target: "audit",
            agent = %identity,
            principal = %credentials.username,
            "Agent paired with site"
        );
        metrics::counter!("agent_receiver_pairings_total").increment(1);

        Ok(PairingResult { root_cert, client_cert })
    }
}
