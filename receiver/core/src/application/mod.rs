// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod identity_resolver;
pub mod pairing;
pub mod registration_workflow;
pub mod ingest;

pub use identity_resolver::IdentityResolver;
pub use ingest::DataIngestGate;
pub use pairing::{PairingResult, PairingService};
pub use registration_workflow::{
    ExistingRegistration, NewRegistration, RegisterNewOngoing, RegistrationStatus, RegistrationWorkflow,
};

use crate::domain::error::ReceiverError;
use crate::infrastructure::certificate_authority::CertificateAuthority;

/// Common name of a CSR whose self-signature verifies
pub(crate) fn verified_common_name(ca: &CertificateAuthority, csr_pem: &str) -> Result<String, ReceiverError> {
    if !ca.verify_signature(csr_pem) {
        return Err(ReceiverError::MalformedCsr(
            "CSR is unreadable or its signature does not verify".to_string(),
        ));
    }
    Ok(ca.extract_common_name(csr_pem)?)
}
