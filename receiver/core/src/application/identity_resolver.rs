// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Identity Resolution
//!
//! Answers "is this agent a provisioned member of the fleet, and how does it
//! connect?" by asking the upstream inventory. Nothing is cached: a host
//! unlinked upstream is refused on its very next request.

use std::sync::Arc;

use crate::domain::error::ReceiverError;
use crate::domain::identity::{AgentIdentity, HostProvisioning};
use crate::domain::inventory::{InventoryError, InventoryService};

pub struct IdentityResolver {
    inventory: Arc<dyn InventoryService>,
}

impl IdentityResolver {
    pub fn new(inventory: Arc<dyn InventoryService>) -> Self {
        Self { inventory }
    }

    /// Resolve the provisioning facts of `identity`.
    ///
    /// Lookups use the receiver's own credentials, so any upstream failure
    /// other than "unknown identity" is reported as `UpstreamUnavailable`.
    pub async fn resolve(&self, identity: AgentIdentity) -> Result<HostProvisioning, ReceiverError> {
        let link = match self.inventory.is_host_linked(identity).await {
            Ok(link) => link,
            Err(InventoryError::NotFound(_)) => return Ok(HostProvisioning::NotRegistered),
            Err(e) => {
                tracing::warn!(agent = %identity, error = %e, "Identity lookup failed");
                return Err(ReceiverError::UpstreamUnavailable(e.to_string()));
            }
        };

        if !link.linked {
            return Ok(HostProvisioning::NotRegistered);
        }

        match (link.hostname, link.connection_mode) {
            (Some(hostname), Some(connection_mode)) => Ok(HostProvisioning::Registered {
                hostname,
                connection_mode,
            }),
            _ => Err(ReceiverError::UpstreamUnavailable(format!(
                "upstream reports {} as linked without hostname or connection mode",
                identity
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::ConnectionMode;
    use crate::domain::inventory::{HostLink, EditionCapabilities, HostConfig, SigningPolicy};
    use crate::domain::identity::Credentials;
    use crate::test_support::MockInventory;
    use async_trait::async_trait;

    /// Upstream that answers every linkage query with a fixed reply
    struct FixedLink(Result<HostLink, InventoryError>);

    #[async_trait]
    impl InventoryService for FixedLink {
        async fn get_host_config(&self, _: &Credentials, _: &str) -> Result<HostConfig, InventoryError> {
            unimplemented!()
        }
        async fn link_host(&self, _: &Credentials, _: &str, _: AgentIdentity) -> Result<(), InventoryError> {
            unimplemented!()
        }
        async fn get_edition_capabilities(&self, _: &Credentials) -> Result<EditionCapabilities, InventoryError> {
            unimplemented!()
        }
        async fn get_signing_policy(&self, _: AgentIdentity) -> Result<SigningPolicy, InventoryError> {
            unimplemented!()
        }
        async fn is_host_linked(&self, _: AgentIdentity) -> Result<HostLink, InventoryError> {
            self.0.clone()
        }
        async fn sign_csr(&self, _: &Credentials, _: &str) -> Result<String, InventoryError> {
            unimplemented!()
        }
        async fn get_root_certificate(&self, _: &Credentials) -> Result<String, InventoryError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn test_linked_identity_resolves() {
        let identity = AgentIdentity::new();
        let inventory = MockInventory::default().linked(identity, "web01", ConnectionMode::Push);
        let resolver = IdentityResolver::new(Arc::new(inventory));

        assert_eq!(
            resolver.resolve(identity).await.unwrap(),
            HostProvisioning::Registered {
                hostname: "web01".to_string(),
                connection_mode: ConnectionMode::Push,
            }
        );
    }

    #[tokio::test]
    async fn test_unlinked_identity_is_not_registered() {
        let resolver = IdentityResolver::new(Arc::new(MockInventory::default()));
        assert_eq!(
            resolver.resolve(AgentIdentity::new()).await.unwrap(),
            HostProvisioning::NotRegistered
        );

        let resolver = IdentityResolver::new(Arc::new(FixedLink(Err(InventoryError::NotFound("x".into())))));
        assert_eq!(
            resolver.resolve(AgentIdentity::new()).await.unwrap(),
            HostProvisioning::NotRegistered
        );
    }

    #[tokio::test]
    async fn test_upstream_failure_is_unavailable() {
        let resolver = IdentityResolver::new(Arc::new(MockInventory::default().unavailable()));
        let err = resolver.resolve(AgentIdentity::new()).await.unwrap_err();
        assert_eq!(err.kind(), "upstream_unavailable");

        let resolver = IdentityResolver::new(Arc::new(FixedLink(Err(InventoryError::Unauthorized("bad secret".into())))));
        let err = resolver.resolve(AgentIdentity::new()).await.unwrap_err();
        assert_eq!(err.kind(), "upstream_unavailable");
    }

    #[tokio::test]
    async fn test_incomplete_link_is_upstream_error() {
        let resolver = IdentityResolver::new(Arc::new(FixedLink(Ok(HostLink {
            linked: true,
            hostname: Some("web01".to_string()),
            connection_mode: None,
        }))));
        let err = resolver.resolve(AgentIdentity::new()).await.unwrap_err();
        assert!(matches!(err, ReceiverError::UpstreamUnavailable(_)));
    }
}
