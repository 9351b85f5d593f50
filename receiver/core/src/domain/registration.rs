// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Registration Records (state machine contract)
//!
//! A registration submitted with labels is tracked as one record per agent
//! identity. The record's state is *where* it is stored, not a field in it:
//!
//! ```text
//! NEW ──► PENDING ──┬──► DECLINED
//!                   └──► READY ──► DISCOVERABLE
//! ```
//!
//! This core only creates records in `NEW` and moves `READY → DISCOVERABLE`
//! on the first data upload. Everything else is decided by the external
//! administrative workflow and only read here.
//!
//! | Trait | Implementations |
//! |-------|-----------------|
//! | `RegistrationStore` | `FilesystemRegistrationStore` |

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::identity::{AgentIdentity, AgentLabels};

/// Registration states, in scan order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RegistrationState {
    /// Freshly submitted, awaiting an administrative decision
    New,
    /// Decision in progress (set externally)
    Pending,
    /// Terminal rejection
    Declined,
    /// Approved, host object exists upstream, awaiting first upload
    Ready,
    /// First upload observed, eligible for service discovery
    Discoverable,
}

impl RegistrationState {
    pub const ALL: [RegistrationState; 5] = [
        RegistrationState::New,
        RegistrationState::Pending,
        RegistrationState::Declined,
        RegistrationState::Ready,
        RegistrationState::Discoverable,
    ];

    /// Name of the directory/queue holding records in this state
    pub fn dir_name(&self) -> &'static str {
        match self {
            RegistrationState::New => "NEW",
            RegistrationState::Pending => "PENDING",
            RegistrationState::Declined => "DECLINED",
            RegistrationState::Ready => "READY",
            RegistrationState::Discoverable => "DISCOVERABLE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RegistrationState::Declined | RegistrationState::Discoverable)
    }
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for RegistrationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RegistrationState::ALL
            .into_iter()
            .find(|state| state.dir_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown registration state '{}'", s))
    }
}

/// Persisted registration request. Serialized as
/// `{"uuid": ..., "username": ..., "agent_labels": {...}}`, plus the optional
/// `message` and `csr` fields when set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub uuid: AgentIdentity,

    /// Authenticated user who submitted the registration
    pub username: String,

    #[serde(default)]
    pub agent_labels: AgentLabels,

    /// Human readable status, e.g. a decline reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// CSR held back until the registration is approved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csr: Option<String>,
}

impl RegistrationRecord {
    pub fn new(uuid: AgentIdentity, username: impl Into<String>, agent_labels: AgentLabels) -> Self {
        Self {
            uuid,
            username: username.into(),
            agent_labels,
            message: None,
            csr: None,
        }
    }

    pub fn with_csr(mut self, csr_pem: impl Into<String>) -> Self {
        self.csr = Some(csr_pem.into());
        self
    }
}

/// A record together with the state it was found in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRegistration {
    pub state: RegistrationState,
    pub record: RegistrationRecord,
}

/// Lazy, finite, non-restartable sequence of records in one state
pub type RegistrationRecords =
    Box<dyn Iterator<Item = Result<RegistrationRecord, RegistrationError>> + Send>;

/// Durable store of registration records keyed by agent identity.
///
/// State transitions must be atomic: a reader observes a record in exactly
/// one state at any time.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Create a record in `NEW`, replacing a queued record for the same
    /// identity (last writer wins).
    ///
    /// `AlreadyExists` is reserved for stores that detect a concurrent
    /// duplicate; the filesystem store never reports it.
    async fn create(
        &self,
        identity: AgentIdentity,
        principal: &str,
        labels: AgentLabels,
    ) -> Result<(), RegistrationError> {
        self.submit(RegistrationRecord::new(identity, principal, labels)).await
    }

    /// Store a fully built record in `NEW`, with the same replacement rules
    /// as [`RegistrationStore::create`]
    async fn submit(&self, record: RegistrationRecord) -> Result<(), RegistrationError>;

    /// Find the record for `identity` in any state
    async fn get(&self, identity: AgentIdentity) -> Result<Option<StoredRegistration>, RegistrationError>;

    /// Move the record from `from` to `to`.
    ///
    /// A record that is not present in `from` is not an error: a concurrent
    /// promotion may already have reached the desired end state.
    async fn promote(
        &self,
        identity: AgentIdentity,
        from: RegistrationState,
        to: RegistrationState,
    ) -> Result<(), RegistrationError>;

    /// Iterate all records currently in `state`
    fn list_by_state(&self, state: RegistrationState) -> Result<RegistrationRecords, RegistrationError>;
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("registration for {0} already exists")]
    AlreadyExists(AgentIdentity),

    #[error("storage error: {0}")]
    Io(String),

    #[error("corrupt registration record {path}: {reason}")]
    Corrupt { path: String, reason: String },
}

impl From<std::io::Error> for RegistrationError {
    fn from(err: std::io::Error) -> Self {
        RegistrationError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names_round_trip() {
        for state in RegistrationState::ALL {
            assert_eq!(state.dir_name().parse::<RegistrationState>().unwrap(), state);
        }
        assert_eq!("ready".parse::<RegistrationState>().unwrap(), RegistrationState::Ready);
        assert!("ACCEPTED".parse::<RegistrationState>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(RegistrationState::Declined.is_terminal());
        assert!(RegistrationState::Discoverable.is_terminal());
        assert!(!RegistrationState::Ready.is_terminal());
    }

    #[test]
    fn test_record_wire_format() {
        let identity = AgentIdentity::from_string("11111111-1111-4111-8111-111111111111").unwrap();
        let labels = AgentLabels::from([("env".to_string(), "prod".to_string())]);
        let record = RegistrationRecord::new(identity, "alice", labels);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "uuid": "11111111-1111-4111-8111-111111111111",
                "username": "alice",
                "agent_labels": {"env": "prod"},
            })
        );
    }

    #[test]
    fn test_record_with_message() {
        let raw = r#"{"uuid":"11111111-1111-4111-8111-111111111111","username":"bob","message":"duplicate host"}"#;
        let record: RegistrationRecord = serde_json::from_str(raw).unwrap();
        assert!(record.agent_labels.is_empty());
        assert_eq!(record.message.as_deref(), Some("duplicate host"));
    }
}
