// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Registration Workflow Use Cases
//!
//! Application service for every way an agent becomes (and stays) a known
//! member of the fleet.
//!
//! # Flows
//!
//! **Register with hostname** (immediate): the host object already exists
//! upstream. Check it belongs to this site and is not a cluster, then link
//! the agent identity to it. Nothing is stored locally.
//!
//! **Register with labels** (deferred): no host object exists yet. Store a
//! `NEW` registration record; an administrative workflow reviews it later
//! and creates the host object.
//!
//! **Register new** (deferred, with certificate): like the label flow, but
//! the agent's CSR is held with the record. The agent polls
//! `register_new_ongoing` until the registration is declined or approved;
//! once approved and linked upstream, the held CSR is signed by the
//! receiver CA.
//!
//! **Register existing**: hostname registration plus certificate issuance by
//! the receiver CA in one round-trip.
//!
//! **Renew certificate**: a registered agent trades a fresh CSR for a new
//! certificate from the receiver CA.
//!
//! **Registration status**: what the upstream and the local record know.

use serde::Serialize;
use std::sync::Arc;

use crate::application::identity_resolver::IdentityResolver;
use crate::application::verified_common_name;
use crate::domain::error::{ReceiverError, FORBIDDEN_NO_HELD_CSR};
use crate::domain::identity::{AgentIdentity, AgentLabels, ConnectionMode, Credentials, HostProvisioning};
use crate::domain::inventory::InventoryService;
use crate::domain::registration::{RegistrationRecord, RegistrationState, RegistrationStore};
use crate::infrastructure::certificate_authority::{CertificateAuthority, SignedCertificate};

/// Combined upstream and local view of one identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationStatus {
    pub hostname: Option<String>,
    pub connection_mode: Option<ConnectionMode>,
    pub status: Option<RegistrationState>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExistingRegistration {
    pub root_cert: String,
    pub agent_cert: String,
    pub connection_mode: ConnectionMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRegistration {
    pub root_cert: String,
}

/// Answer to an agent polling its `register_new` submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status")]
pub enum RegisterNewOngoing {
    InProgress,
    Declined { reason: String },
    Success { agent_cert: String, connection_mode: ConnectionMode },
}

const DEFAULT_DECLINE_REASON: &str = "registration declined";

pub struct RegistrationWorkflow {
    ca: Arc<CertificateAuthority>,
    inventory: Arc<dyn InventoryService>,
    resolver: Arc<IdentityResolver>,
    store: Arc<dyn RegistrationStore>,
    /// Site this receiver serves
    site: String,
}

impl RegistrationWorkflow {
    pub fn new(
        ca: Arc<CertificateAuthority>,
        inventory: Arc<dyn InventoryService>,
        resolver: Arc<IdentityResolver>,
        store: Arc<dyn RegistrationStore>,
        site: impl Into<String>,
    ) -> Self {
        Self {
            ca,
            inventory,
            resolver,
            store,
            site: site.into(),
        }
    }

    /// Link `identity` to the existing host object `hostname`
    pub async fn register_with_hostname(
        &self,
        credentials: &Credentials,
        identity: AgentIdentity,
        hostname: &str,
    ) -> Result<(), ReceiverError> {
        let host = self.inventory.get_host_config(credentials, hostname).await?;

        if host.site != self.site {
            return Err(ReceiverError::SiteMismatch {
                hostname: hostname.to_string(),
                host_site: host.site,
                receiver_site: self.site.clone(),
            });
        }
        if host.is_cluster {
            return Err(ReceiverError::ClusterHostRejected(hostname.to_string()));
        }

        self.inventory.link_host(credentials, hostname, identity).await?;

        tracing::info!(
            target: "audit",
            agent = %identity,
            hostname = %hostname,
            principal = %credentials.username,
            "Agent linked to host"
        );
        metrics::counter!("agent_receiver_registrations_total", "kind" => "hostname").increment(1);
        Ok(())
    }

    /// Queue a label based registration for administrative review
    pub async fn register_with_labels(
        &self,
        credentials: &Credentials,
        identity: AgentIdentity,
        labels: AgentLabels,
    ) -> Result<(), ReceiverError> {
        let edition = self.inventory.get_edition_capabilities(credentials).await?;
        if !edition.supports_label_registration {
            return Err(ReceiverError::UnsupportedEdition);
        }

        self.store.create(identity, &credentials.username, labels).await?;

        tracing::info!(
            target: "audit",
            agent = %identity,
            principal = %credentials.username,
            "Label registration queued"
        );
        metrics::counter!("agent_receiver_registrations_total", "kind" => "labels").increment(1);
        Ok(())
    }

    /// Queue a label registration that carries the agent's CSR
    pub async fn register_new(
        &self,
        credentials: &Credentials,
        identity: AgentIdentity,
        labels: AgentLabels,
        csr_pem: &str,
    ) -> Result<NewRegistration, ReceiverError> {
        self.check_csr_binding(identity, csr_pem)?;

        let edition = self.inventory.get_edition_capabilities(credentials).await?;
        if !edition.supports_label_registration {
            return Err(ReceiverError::UnsupportedEdition);
        }

        let record = RegistrationRecord::new(identity, &credentials.username, labels).with_csr(csr_pem);
        self.store.submit(record).await?;

        tracing::info!(
            target: "audit",
            agent = %identity,
            principal = %credentials.username,
            "New registration queued with CSR"
        );
        metrics::counter!("agent_receiver_registrations_total", "kind" => "new").increment(1);
        Ok(NewRegistration {
            root_cert: self.ca.root_certificate_pem().to_string(),
        })
    }

    /// Where a `register_new` submission stands
    pub async fn register_new_ongoing(&self, identity: AgentIdentity) -> Result<RegisterNewOngoing, ReceiverError> {
        let stored = self
            .store
            .get(identity)
            .await?
            .ok_or(ReceiverError::NotRegistered(identity))?;

        match stored.state {
            RegistrationState::New | RegistrationState::Pending => Ok(RegisterNewOngoing::InProgress),
            RegistrationState::Declined => Ok(RegisterNewOngoing::Declined {
                reason: stored
                    .record
                    .message
                    .unwrap_or_else(|| DEFAULT_DECLINE_REASON.to_string()),
            }),
            RegistrationState::Ready | RegistrationState::Discoverable => {
                // Approved locally, but the host object may not be activated yet
                let connection_mode = match self.resolver.resolve(identity).await? {
                    HostProvisioning::Registered { connection_mode, .. } => connection_mode,
                    HostProvisioning::NotRegistered => return Ok(RegisterNewOngoing::InProgress),
                };
                let csr_pem = stored
                    .record
                    .csr
                    .ok_or_else(|| ReceiverError::Forbidden(FORBIDDEN_NO_HELD_CSR.to_string()))?;

                let certificate = self.issue(identity, &csr_pem).await?;
                tracing::info!(
                    target: "audit",
                    agent = %identity,
                    serial = %certificate.serial_hex,
                    "Certificate issued for approved registration"
                );
                Ok(RegisterNewOngoing::Success {
                    agent_cert: certificate.pem,
                    connection_mode,
                })
            }
        }
    }

    /// Issue a fresh certificate to a registered agent
    pub async fn renew_certificate(
        &self,
        identity: AgentIdentity,
        csr_pem: &str,
    ) -> Result<SignedCertificate, ReceiverError> {
        self.check_csr_binding(identity, csr_pem)?;

        if !self.resolver.resolve(identity).await?.is_registered() {
            return Err(ReceiverError::NotRegistered(identity));
        }

        let certificate = self.issue(identity, csr_pem).await?;
        tracing::info!(
            agent = %identity,
            serial = %certificate.serial_hex,
            not_after = %certificate.not_after,
            "Certificate renewed"
        );
        Ok(certificate)
    }

    /// Link to an existing host and issue a receiver certificate in one go
    pub async fn register_existing(
        &self,
        credentials: &Credentials,
        identity: AgentIdentity,
        hostname: &str,
        csr_pem: &str,
    ) -> Result<ExistingRegistration, ReceiverError> {
        self.check_csr_binding(identity, csr_pem)?;
        self.register_with_hostname(credentials, identity, hostname).await?;

        let connection_mode = match self.resolver.resolve(identity).await? {
            HostProvisioning::Registered { connection_mode, .. } => connection_mode,
            HostProvisioning::NotRegistered => return Err(ReceiverError::NotRegistered(identity)),
        };

        let certificate = self.issue(identity, csr_pem).await?;
        Ok(ExistingRegistration {
            root_cert: self.ca.root_certificate_pem().to_string(),
            agent_cert: certificate.pem,
            connection_mode,
        })
    }

    pub async fn registration_status(&self, identity: AgentIdentity) -> Result<RegistrationStatus, ReceiverError> {
        let provisioning = self.resolver.resolve(identity).await?;
        let stored = self.store.get(identity).await?;

        if !provisioning.is_registered() && stored.is_none() {
            return Err(ReceiverError::NotRegistered(identity));
        }

        let (status, message) = match stored {
            Some(stored) => (Some(stored.state), stored.record.message),
            None => (None, None),
        };

        Ok(RegistrationStatus {
            hostname: provisioning.hostname().map(str::to_string),
            connection_mode: provisioning.connection_mode(),
            status,
            message,
        })
    }

    /// CSR must verify and name exactly this identity
    fn check_csr_binding(&self, identity: AgentIdentity, csr_pem: &str) -> Result<(), ReceiverError> {
        let common_name = verified_common_name(&self.ca, csr_pem)?;
        match AgentIdentity::from_string(&common_name) {
            Ok(claimed) if claimed == identity => Ok(()),
            _ => Err(ReceiverError::UuidMismatch {
                csr_common_name: common_name,
                identity,
            }),
        }
    }

    async fn issue(&self, identity: AgentIdentity, csr_pem: &str) -> Result<SignedCertificate, ReceiverError> {
        let policy = self.inventory.get_signing_policy(identity).await?;
        Ok(self.ca.sign(csr_pem, policy.validity_months)?)
    }
}
