// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Receiver error taxonomy
//!
//! Every operation exposed to agents returns a [`ReceiverError`] whose
//! [`kind`](ReceiverError::kind) is stable, so an agent can decide whether to
//! retry, re-register or alert an operator.
//!
//! - client input: `InvalidIdentity`, `MalformedCsr`, `UuidMismatch`
//! - infrastructure: `CaUnavailable`, `Storage`, `UpstreamUnavailable`
//! - business state: `Forbidden`, `NotRegistered`, `SiteMismatch`,
//!   `ClusterHostRejected`, `UnsupportedEdition`, `AlreadyExists`
//! - payload: `UnsupportedCompression`, `DecompressionFailed`

use thiserror::Error;

use crate::domain::compression::CompressionError;
use crate::domain::identity::AgentIdentity;
use crate::domain::inventory::InventoryError;
use crate::domain::registration::RegistrationError;

pub const FORBIDDEN_NOT_REGISTERED: &str = "not registered";
pub const FORBIDDEN_NOT_PUSH_HOST: &str = "not a push host";
pub const FORBIDDEN_NO_HELD_CSR: &str = "no certificate request on file";

#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("invalid agent identity: {0}")]
    InvalidIdentity(String),

    #[error("malformed CSR: {0}")]
    MalformedCsr(String),

    #[error("CSR common name '{csr_common_name}' does not match agent identity {identity}")]
    UuidMismatch {
        csr_common_name: String,
        identity: AgentIdentity,
    },

    #[error("certificate authority unavailable: {0}")]
    CaUnavailable(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("upstream inventory unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("host not found: {0}")]
    HostNotFound(String),

    #[error("upstream rejected request: {0}")]
    UpstreamRejected(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("unsupported compression: {0}")]
    UnsupportedCompression(String),

    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("registration for {0} already exists")]
    AlreadyExists(AgentIdentity),

    #[error("host {hostname} is monitored by site '{host_site}', not by this site '{receiver_site}'")]
    SiteMismatch {
        hostname: String,
        host_site: String,
        receiver_site: String,
    },

    #[error("host {0} is a cluster host; register its nodes instead")]
    ClusterHostRejected(String),

    #[error("this edition does not support registration with agent labels")]
    UnsupportedEdition,

    #[error("agent {0} is not registered")]
    NotRegistered(AgentIdentity),
}

impl ReceiverError {
    /// Stable machine readable classification
    pub fn kind(&self) -> &'static str {
        match self {
            ReceiverError::InvalidIdentity(_) => "invalid_identity",
            ReceiverError::MalformedCsr(_) => "malformed_csr",
            ReceiverError::UuidMismatch { .. } => "uuid_mismatch",
            ReceiverError::CaUnavailable(_) => "ca_unavailable",
            ReceiverError::Storage(_) => "storage_error",
            ReceiverError::UpstreamUnavailable(_) => "upstream_unavailable",
            ReceiverError::Unauthorized(_) => "unauthorized",
            ReceiverError::HostNotFound(_) => "host_not_found",
            ReceiverError::UpstreamRejected(_) => "upstream_rejected",
            ReceiverError::Forbidden(_) => "forbidden",
            ReceiverError::UnsupportedCompression(_) => "unsupported_compression",
            ReceiverError::DecompressionFailed(_) => "decompression_failed",
            ReceiverError::AlreadyExists(_) => "already_exists",
            ReceiverError::SiteMismatch { .. } => "site_mismatch",
            ReceiverError::ClusterHostRejected(_) => "cluster_host_rejected",
            ReceiverError::UnsupportedEdition => "unsupported_edition",
            ReceiverError::NotRegistered(_) => "not_registered",
        }
    }

    /// Failures of the receiver or its collaborators rather than of the request
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            ReceiverError::CaUnavailable(_)
                | ReceiverError::Storage(_)
                | ReceiverError::UpstreamUnavailable(_)
        )
    }
}

impl From<InventoryError> for ReceiverError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::Unavailable(msg) => ReceiverError::UpstreamUnavailable(msg),
            InventoryError::Unauthorized(msg) => ReceiverError::Unauthorized(msg),
            InventoryError::NotFound(msg) => ReceiverError::HostNotFound(msg),
            InventoryError::Rejected(msg) => ReceiverError::UpstreamRejected(msg),
        }
    }
}

impl From<RegistrationError> for ReceiverError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::AlreadyExists(identity) => ReceiverError::AlreadyExists(identity),
            other => ReceiverError::Storage(other.to_string()),
        }
    }
}

impl From<CompressionError> for ReceiverError {
    fn from(err: CompressionError) -> Self {
        match err {
            CompressionError::Unsupported(tag) => ReceiverError::UnsupportedCompression(tag),
            other => ReceiverError::DecompressionFailed(other.to_string()),
        }
    }
}
