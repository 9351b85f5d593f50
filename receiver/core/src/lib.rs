// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Receiver Core
//!
//! Bootstrap and lifecycle management for monitoring agents: certificate
//! signing, the filesystem-backed registration state machine and the gate
//! that admits agent data uploads.
//!
//! # Architecture
//!
//! - **domain:** identities, registration records, collaborator contracts, errors
//! - **application:** pairing, registration workflows, identity resolution, ingest
//! - **infrastructure:** CA, filesystem stores, upstream REST client
//! - **presentation:** HTTP routes (axum)

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

#[cfg(test)]
pub(crate) mod test_support;

pub use domain::*;
