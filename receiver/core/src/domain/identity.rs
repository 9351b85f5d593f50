// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent identity and provisioning value types.
//!
//! An [`AgentIdentity`] names exactly one agent installation. It is the CSR
//! common name, the filename stem of every on-disk artifact and the key of
//! every lookup, so its textual form is always the lowercase hyphenated UUID.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentIdentity(pub Uuid);

impl AgentIdentity {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for AgentIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for AgentIdentity {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

/// User supplied labels attached to a registration, kept verbatim
pub type AgentLabels = BTreeMap<String, String>;

/// How the monitoring server obtains data from an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    /// Agent sends data unsolicited
    Push,
    /// Agent is polled by the server
    Pull,
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionMode::Push => write!(f, "push"),
            ConnectionMode::Pull => write!(f, "pull"),
        }
    }
}

/// Provisioning facts for one identity, derived on demand from the upstream
/// inventory. Hostname and connection mode only exist for registered agents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostProvisioning {
    NotRegistered,
    Registered {
        hostname: String,
        connection_mode: ConnectionMode,
    },
}

impl HostProvisioning {
    pub fn is_registered(&self) -> bool {
        matches!(self, HostProvisioning::Registered { .. })
    }

    pub fn hostname(&self) -> Option<&str> {
        match self {
            HostProvisioning::Registered { hostname, .. } => Some(hostname),
            HostProvisioning::NotRegistered => None,
        }
    }

    pub fn connection_mode(&self) -> Option<ConnectionMode> {
        match self {
            HostProvisioning::Registered { connection_mode, .. } => Some(*connection_mode),
            HostProvisioning::NotRegistered => None,
        }
    }
}

/// Username/password pair of an authenticated user, forwarded to the
/// upstream inventory for user initiated calls
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}
