// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! REST Inventory Client
//!
//! Implements [`InventoryService`] against the upstream site's REST API.
//!
//! # API Endpoints
//!
//! - `GET objects/host_config/{hostname}` - site and cluster flag of a host
//! - `PUT objects/host_config/{hostname}/actions/link_uuid/invoke` - link an agent identity
//! - `GET agent_receiver/edition` - edition capabilities
//! - `GET agent_receiver/signing_policy/{uuid}` - certificate lifetime
//! - `GET agent_receiver/hosts/{uuid}` - linkage of an identity
//! - `POST agent_receiver/csr` - sign a CSR with the site CA
//! - `GET agent_receiver/root_cert` - site root certificate
//!
//! Every call shares one client-wide timeout. A timeout is reported exactly
//! like an unreachable upstream.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::identity::{AgentIdentity, Credentials};
use crate::domain::inventory::{
    EditionCapabilities, HostConfig, HostLink, InventoryError, InventoryService, SigningPolicy,
};

pub struct RestInventoryClient {
    client: Client,

    /// Base URL of the REST API, e.g. "https://monitoring/heute/check_mk/api/1.0"
    base_url: Url,

    /// Used for agent initiated calls, which carry no user credentials
    automation: Credentials,
}

#[derive(Serialize)]
struct LinkRequest {
    uuid: AgentIdentity,
}

#[derive(Serialize)]
struct CsrRequest<'a> {
    csr: &'a str,
}

#[derive(Deserialize)]
struct CertResponse {
    cert: String,
}

impl RestInventoryClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        automation: Credentials,
    ) -> Result<Self, InventoryError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| InventoryError::Unavailable(format!("invalid inventory URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(InventoryError::Unavailable(format!(
                "inventory URL '{}' cannot be a base",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InventoryError::Unavailable(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            automation,
        })
    }

    /// Build full URL from path segments, escaping each one
    fn build_url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, request: RequestBuilder, credentials: &Credentials) -> Result<Response, InventoryError> {
        let response = request
            .basic_auth(&credentials.username, Some(&credentials.password))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InventoryError::Unavailable(format!("request timed out: {}", e))
                } else {
                    InventoryError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        let detail = format!("HTTP {}: {}", status, error_text);
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => InventoryError::Unauthorized(detail),
            StatusCode::NOT_FOUND => InventoryError::NotFound(detail),
            s if s.is_client_error() => InventoryError::Rejected(detail),
            _ => InventoryError::Unavailable(detail),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        credentials: &Credentials,
    ) -> Result<T, InventoryError> {
        let url = self.build_url(segments);
        tracing::debug!(url = %url, "Inventory request");
        let response = self.send(self.client.get(url), credentials).await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, InventoryError> {
    response
        .json()
        .await
        .map_err(|e| InventoryError::Unavailable(format!("Failed to parse response: {}", e)))
}

#[async_trait]
impl InventoryService for RestInventoryClient {
    async fn get_host_config(&self, credentials: &Credentials, hostname: &str) -> Result<HostConfig, InventoryError> {
        self.get_json(&["objects", "host_config", hostname], credentials).await
    }

    async fn link_host(
        &self,
        credentials: &Credentials,
        hostname: &str,
        identity: AgentIdentity,
    ) -> Result<(), InventoryError> {
        let url = self.build_url(&["objects", "host_config", hostname, "actions", "link_uuid", "invoke"]);
        self.send(self.client.put(url).json(&LinkRequest { uuid: identity }), credentials)
            .await?;
        Ok(())
    }

    async fn get_edition_capabilities(&self, credentials: &Credentials) -> Result<EditionCapabilities, InventoryError> {
        self.get_json(&["agent_receiver", "edition"], credentials).await
    }

    async fn get_signing_policy(&self, identity: AgentIdentity) -> Result<SigningPolicy, InventoryError> {
        let uuid = identity.to_string();
        self.get_json(&["agent_receiver", "signing_policy", &uuid], &self.automation)
            .await
    }

    async fn is_host_linked(&self, identity: AgentIdentity) -> Result<HostLink, InventoryError> {
        let uuid = identity.to_string();
        self.get_json(&["agent_receiver", "hosts", &uuid], &self.automation).await
    }

    async fn sign_csr(&self, credentials: &Credentials, csr_pem: &str) -> Result<String, InventoryError> {
        let url = self.build_url(&["agent_receiver", "csr"]);
        let response = self
            .send(self.client.post(url).json(&CsrRequest { csr: csr_pem }), credentials)
            .await?;
        let body: CertResponse = decode(response).await?;
        Ok(body.cert)
    }

    async fn get_root_certificate(&self, credentials: &Credentials) -> Result<String, InventoryError> {
        let body: CertResponse = self.get_json(&["agent_receiver", "root_cert"], credentials).await?;
        Ok(body.cert)
    }
}
