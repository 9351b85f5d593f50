// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared unit test fixtures: throwaway PKI material and an in-memory
//! upstream inventory.

use async_trait::async_trait;
use rcgen::{BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::domain::identity::{AgentIdentity, ConnectionMode, Credentials};
use crate::domain::inventory::{
    EditionCapabilities, HostConfig, HostLink, InventoryError, InventoryService, SigningPolicy,
};

pub const SITE: &str = "heute";

/// Self-signed root certificate followed by its PKCS#8 key
pub fn root_pem() -> String {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::default();
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, "Site Root CA");
    params.distinguished_name = dn;
    let cert = params.self_signed(&key).unwrap();
    format!("{}{}", cert.pem(), key.serialize_pem())
}

pub fn csr_for(common_name: &str) -> String {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    params.distinguished_name = dn;
    params.serialize_request(&key).unwrap().pem().unwrap()
}

/// Flip the first byte of `common_name` inside the signed part of the CSR
pub fn tamper(csr_pem: &str, common_name: &str) -> String {
    let block = ::pem::parse(csr_pem.as_bytes()).unwrap();
    let mut der = block.contents().to_vec();
    let needle = common_name.as_bytes();
    let pos = der.windows(needle.len()).position(|w| w == needle).unwrap();
    der[pos] ^= 0x01;
    ::pem::encode(&::pem::Pem::new("CERTIFICATE REQUEST", der))
}

pub fn user() -> Credentials {
    Credentials::new("cmkadmin", "secret")
}

/// In-memory upstream. Linking a host makes `is_host_linked` report it.
pub struct MockInventory {
    pub hosts: HashMap<String, (HostConfig, ConnectionMode)>,
    pub links: Mutex<HashMap<AgentIdentity, HostLink>>,
    pub supports_label_registration: bool,
    pub validity_months: u32,
    pub unavailable: bool,
    pub link_calls: AtomicUsize,
    pub sign_calls: AtomicUsize,
}

impl Default for MockInventory {
    fn default() -> Self {
        Self {
            hosts: HashMap::new(),
            links: Mutex::new(HashMap::new()),
            supports_label_registration: true,
            validity_months: 3,
            unavailable: false,
            link_calls: AtomicUsize::new(0),
            sign_calls: AtomicUsize::new(0),
        }
    }
}

impl MockInventory {
    pub fn with_host(mut self, hostname: &str, site: &str, mode: ConnectionMode) -> Self {
        self.hosts.insert(
            hostname.to_string(),
            (
                HostConfig {
                    site: site.to_string(),
                    is_cluster: false,
                },
                mode,
            ),
        );
        self
    }

    pub fn with_cluster(mut self, hostname: &str) -> Self {
        self.hosts.insert(
            hostname.to_string(),
            (
                HostConfig {
                    site: SITE.to_string(),
                    is_cluster: true,
                },
                ConnectionMode::Pull,
            ),
        );
        self
    }

    /// Pretend `identity` is already linked to `hostname`
    pub fn linked(self, identity: AgentIdentity, hostname: &str, mode: ConnectionMode) -> Self {
        self.links.lock().unwrap().insert(
            identity,
            HostLink {
                linked: true,
                hostname: Some(hostname.to_string()),
                connection_mode: Some(mode),
            },
        );
        self
    }

    /// Link `identity` after construction, as an approval upstream would
    pub fn approve(&self, identity: AgentIdentity, hostname: &str, mode: ConnectionMode) {
        self.links.lock().unwrap().insert(
            identity,
            HostLink {
                linked: true,
                hostname: Some(hostname.to_string()),
                connection_mode: Some(mode),
            },
        );
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    fn check(&self) -> Result<(), InventoryError> {
        if self.unavailable {
            return Err(InventoryError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryService for MockInventory {
    async fn get_host_config(&self, _credentials: &Credentials, hostname: &str) -> Result<HostConfig, InventoryError> {
        self.check()?;
        self.hosts
            .get(hostname)
            .map(|(config, _)| config.clone())
            .ok_or_else(|| InventoryError::NotFound(hostname.to_string()))
    }

    async fn link_host(
        &self,
        _credentials: &Credentials,
        hostname: &str,
        identity: AgentIdentity,
    ) -> Result<(), InventoryError> {
        self.check()?;
        self.link_calls.fetch_add(1, Ordering::SeqCst);
        let (_, mode) = self
            .hosts
            .get(hostname)
            .ok_or_else(|| InventoryError::NotFound(hostname.to_string()))?;
        self.links.lock().unwrap().insert(
            identity,
            HostLink {
                linked: true,
                hostname: Some(hostname.to_string()),
                connection_mode: Some(*mode),
            },
        );
        Ok(())
    }

    async fn get_edition_capabilities(&self, _credentials: &Credentials) -> Result<EditionCapabilities, InventoryError> {
        self.check()?;
        Ok(EditionCapabilities {
            supports_label_registration: self.supports_label_registration,
        })
    }

    async fn get_signing_policy(&self, _identity: AgentIdentity) -> Result<SigningPolicy, InventoryError> {
        self.check()?;
        Ok(SigningPolicy {
            validity_months: self.validity_months,
        })
    }

    async fn is_host_linked(&self, identity: AgentIdentity) -> Result<HostLink, InventoryError> {
        self.check()?;
        Ok(self.links.lock().unwrap().get(&identity).cloned().unwrap_or(HostLink {
            linked: false,
            hostname: None,
            connection_mode: None,
        }))
    }

    async fn sign_csr(&self, _credentials: &Credentials, _csr_pem: &str) -> Result<String, InventoryError> {
        self.check()?;
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        Ok("-----BEGIN CERTIFICATE-----\nU0lURQ==\n-----END CERTIFICATE-----\n".to_string())
    }

    async fn get_root_certificate(&self, _credentials: &Credentials) -> Result<String, InventoryError> {
        self.check()?;
        Ok("-----BEGIN CERTIFICATE-----\nUk9PVA==\n-----END CERTIFICATE-----\n".to_string())
    }
}
