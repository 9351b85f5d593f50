// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Data Ingest Gate
//!
//! Admits monitoring data only from registered push agents.
//!
//! # Flow
//!
//! 1. Resolve the identity upstream (fail closed on any upstream error)
//! 2. Require connection mode `push`
//! 3. Select the decompressor from the announced tag (absent tag is refused)
//! 4. Decompress within the configured size limit
//! 5. Replace `<data_root>/<uuid>/agent_output`
//! 6. Promote a `READY` registration to `DISCOVERABLE` (best effort)
//!
//! Steps 1–4 write nothing, so a refused upload leaves the filesystem as it
//! was.

use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;

use crate::application::identity_resolver::IdentityResolver;
use crate::domain::compression::Compression;
use crate::domain::error::{ReceiverError, FORBIDDEN_NOT_PUSH_HOST, FORBIDDEN_NOT_REGISTERED};
use crate::domain::identity::{AgentIdentity, ConnectionMode, HostProvisioning};
use crate::domain::registration::{RegistrationState, RegistrationStore};
use crate::infrastructure::output_store::AgentOutputStore;

pub struct DataIngestGate {
    resolver: Arc<IdentityResolver>,
    store: Arc<dyn RegistrationStore>,
    output: Arc<AgentOutputStore>,
    max_decompressed_bytes: u64,
}

impl DataIngestGate {
    pub fn new(
        resolver: Arc<IdentityResolver>,
        store: Arc<dyn RegistrationStore>,
        output: Arc<AgentOutputStore>,
        max_decompressed_bytes: u64,
    ) -> Self {
        Self {
            resolver,
            store,
            output,
            max_decompressed_bytes,
        }
    }

    pub async fn ingest(
        &self,
        identity: AgentIdentity,
        compression_tag: Option<&str>,
        payload: Bytes,
    ) -> Result<PathBuf, ReceiverError> {
        let result = self.admit_and_store(identity, compression_tag, payload).await;
        let outcome = match &result {
            Ok(_) => "accepted",
            Err(e) => e.kind(),
        };
        metrics::counter!("agent_receiver_ingest_total", "outcome" => outcome).increment(1);
        result
    }

    async fn admit_and_store(
        &self,
        identity: AgentIdentity,
        compression_tag: Option<&str>,
        payload: Bytes,
    ) -> Result<PathBuf, ReceiverError> {
        match self.resolver.resolve(identity).await? {
            HostProvisioning::NotRegistered => {
                return Err(ReceiverError::Forbidden(FORBIDDEN_NOT_REGISTERED.to_string()))
            }
            HostProvisioning::Registered { connection_mode, .. } if connection_mode != ConnectionMode::Push => {
                return Err(ReceiverError::Forbidden(FORBIDDEN_NOT_PUSH_HOST.to_string()))
            }
            HostProvisioning::Registered { .. } => {}
        }

        let compression = match compression_tag {
            Some(tag) => Compression::from_tag(tag)?,
            None => {
                return Err(ReceiverError::UnsupportedCompression(
                    "missing compression header".to_string(),
                ))
            }
        };
        let limit = self.max_decompressed_bytes;
        let decompressed = tokio::task::spawn_blocking(move || compression.decompress(&payload, limit))
            .await
            .map_err(|e| ReceiverError::DecompressionFailed(format!("decompression task failed: {}", e)))??;

        let size = decompressed.len();
        let path = self
            .output
            .write(identity, decompressed)
            .await
            .map_err(|e| ReceiverError::Storage(format!("failed to store agent output: {}", e)))?;
        tracing::debug!(agent = %identity, compression = %compression, bytes = size, "Agent output stored");

        // A missed promotion is retried by the next upload
        if let Err(e) = self
            .store
            .promote(identity, RegistrationState::Ready, RegistrationState::Discoverable)
            .await
        {
            tracing::warn!(agent = %identity, error = %e, "Failed to mark registration discoverable");
        }

        Ok(path)
    }
}
