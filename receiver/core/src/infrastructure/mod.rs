// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod certificate_authority;
pub mod registration_store;
pub mod output_store;
pub mod inventory_client;

pub use certificate_authority::{CaError, CertificateAuthority, SignedCertificate};
pub use inventory_client::RestInventoryClient;
pub use output_store::AgentOutputStore;
pub use registration_store::FilesystemRegistrationStore;
