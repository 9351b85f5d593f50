// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end registration lifecycle over the HTTP routes.
//!
//! A label registration is queued, approved by an administrator (who moves
//! the record and links the host upstream), receives its first push upload
//! and becomes discoverable. Certificate renewal is checked against the
//! receiver CA along the way.

use agent_receiver_core::application::{DataIngestGate, IdentityResolver, PairingService, RegistrationWorkflow};
use agent_receiver_core::domain::identity::{AgentIdentity, ConnectionMode, Credentials};
use agent_receiver_core::domain::inventory::{
    EditionCapabilities, HostConfig, HostLink, InventoryError, InventoryService, SigningPolicy,
};
use agent_receiver_core::domain::registration::{RegistrationState, RegistrationStore};
use agent_receiver_core::infrastructure::{AgentOutputStore, CertificateAuthority, FilesystemRegistrationStore};
use agent_receiver_core::presentation::{app, AppState};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use rcgen::{BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tempfile::TempDir;
use tower::ServiceExt;

const SITE: &str = "heute";
// "cmkadmin:secret"
const AUTH: &str = "Basic Y21rYWRtaW46c2VjcmV0";

/// Upstream whose only state is the set of linked agents
#[derive(Default)]
struct Inventory {
    links: Mutex<HashMap<AgentIdentity, (String, ConnectionMode)>>,
}

impl Inventory {
    fn approve(&self, identity: AgentIdentity, hostname: &str, mode: ConnectionMode) {
        self.links.lock().unwrap().insert(identity, (hostname.to_string(), mode));
    }
}

#[async_trait]
impl InventoryService for Inventory {
    async fn get_host_config(&self, _credentials: &Credentials, hostname: &str) -> Result<HostConfig, InventoryError> {
        Err(InventoryError::NotFound(hostname.to_string()))
    }

    async fn link_host(&self, _: &Credentials, hostname: &str, _: AgentIdentity) -> Result<(), InventoryError> {
        Err(InventoryError::NotFound(hostname.to_string()))
    }

    async fn get_edition_capabilities(&self, _credentials: &Credentials) -> Result<EditionCapabilities, InventoryError> {
        Ok(EditionCapabilities {
            supports_label_registration: true,
        })
    }

    async fn get_signing_policy(&self, _identity: AgentIdentity) -> Result<SigningPolicy, InventoryError> {
        Ok(SigningPolicy { validity_months: 12 })
    }

    async fn is_host_linked(&self, identity: AgentIdentity) -> Result<HostLink, InventoryError> {
        Ok(match self.links.lock().unwrap().get(&identity) {
            Some((hostname, mode)) => HostLink {
                linked: true,
                hostname: Some(hostname.clone()),
                connection_mode: Some(*mode),
            },
            None => HostLink {
                linked: false,
                hostname: None,
                connection_mode: None,
            },
        })
    }

    async fn sign_csr(&self, _credentials: &Credentials, _csr_pem: &str) -> Result<String, InventoryError> {
        Err(InventoryError::Unavailable("not used".to_string()))
    }

    async fn get_root_certificate(&self, _credentials: &Credentials) -> Result<String, InventoryError> {
        Err(InventoryError::Unavailable("not used".to_string()))
    }
}

struct Harness {
    router: Router,
    inventory: Arc<Inventory>,
    store: Arc<FilesystemRegistrationStore>,
    ca: Arc<CertificateAuthority>,
    dir: TempDir,
}

fn root_pem() -> String {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::default();
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, "Integration Root CA");
    params.distinguished_name = dn;
    let cert = params.self_signed(&key).unwrap();
    format!("{}{}", key.serialize_pem(), cert.pem())
}

fn csr_for(common_name: &str) -> String {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    params.distinguished_name = dn;
    params.serialize_request(&key).unwrap().pem().unwrap()
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let root_path = dir.path().join("ca.pem");
    std::fs::write(&root_path, root_pem()).unwrap();

    let inventory = Arc::new(Inventory::default());
    let ca = Arc::new(CertificateAuthority::load_root(&root_path).unwrap());
    let store = Arc::new(FilesystemRegistrationStore::new(dir.path().join("registration")));
    let output = Arc::new(AgentOutputStore::new(dir.path().join("received-outputs")));
    let resolver = Arc::new(IdentityResolver::new(inventory.clone()));

    let state = AppState {
        pairing: Arc::new(PairingService::new(ca.clone(), inventory.clone())),
        workflow: Arc::new(RegistrationWorkflow::new(
            ca.clone(),
            inventory.clone(),
            resolver.clone(),
            store.clone(),
            SITE,
        )),
        ingest: Arc::new(DataIngestGate::new(resolver, store.clone(), output, 16 * 1024 * 1024)),
        retry_after_secs: 60,
        start_time: Instant::now(),
    };

    Harness {
        router: app(state, 16 * 1024 * 1024),
        inventory,
        store,
        ca,
        dir,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn status_request(identity: AgentIdentity) -> Request<Body> {
    Request::get(format!("/registration_status/{}", identity))
        .body(Body::empty())
        .unwrap()
}

fn upload(identity: AgentIdentity, data: &[u8]) -> Request<Body> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    Request::post(format!("/agent_data/{}", identity))
        .header("compression", "zlib")
        .body(Body::from(encoder.finish().unwrap()))
        .unwrap()
}

#[tokio::test]
async fn test_label_registration_lifecycle() {
    let h = harness();
    let identity = AgentIdentity::new();

    // Unknown everywhere
    let (status, body) = send(&h.router, status_request(identity)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_registered");

    let request = Request::post("/register_with_labels")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, AUTH)
        .body(Body::from(
            json!({"uuid": identity.to_string(), "agent_labels": {"os": "linux"}}).to_string(),
        ))
        .unwrap();
    let (status, _) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&h.router, status_request(identity)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "NEW");
    assert!(body["hostname"].is_null());

    // Uploads before approval are refused and leave nothing behind
    let (status, _) = send(&h.router, upload(identity, b"<<<check_mk>>>")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let output = h.dir.path().join("received-outputs").join(identity.to_string());
    assert!(!output.exists());

    // Administrator approves
    h.store
        .promote(identity, RegistrationState::New, RegistrationState::Ready)
        .await
        .unwrap();
    h.inventory.approve(identity, "web01", ConnectionMode::Push);

    let (status, body) = send(&h.router, status_request(identity)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "READY");
    assert_eq!(body["hostname"], "web01");
    assert_eq!(body["connection_mode"], "push");

    let (status, _) = send(&h.router, upload(identity, b"<<<check_mk>>>")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(std::fs::read(output.join("agent_output")).unwrap(), b"<<<check_mk>>>");

    let (_, body) = send(&h.router, status_request(identity)).await;
    assert_eq!(body["status"], "DISCOVERABLE");
}

#[tokio::test]
async fn test_renewal_issues_certificate_from_receiver_ca() {
    let h = harness();
    let identity = AgentIdentity::new();
    h.inventory.approve(identity, "web01", ConnectionMode::Pull);

    let request = Request::post(format!("/renew_certificate/{}", identity))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"csr": csr_for(&identity.to_string())}).to_string()))
        .unwrap();
    let (status, body) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::OK);

    let pem = body["agent_cert"].as_str().unwrap();
    let der = ::pem::parse(pem.as_bytes()).unwrap();
    let (_, cert) = x509_parser::parse_x509_certificate(der.contents()).unwrap();
    let cn = cert.subject().iter_common_name().next().unwrap().as_str().unwrap();
    assert_eq!(cn, identity.to_string());

    let root = ::pem::parse(h.ca.root_certificate_pem().as_bytes()).unwrap();
    let (_, root) = x509_parser::parse_x509_certificate(root.contents()).unwrap();
    assert!(cert.verify_signature(Some(root.public_key())).is_ok());
}

#[tokio::test]
async fn test_renewal_for_another_identity_rejected() {
    let h = harness();
    let identity = AgentIdentity::new();
    h.inventory.approve(identity, "web01", ConnectionMode::Push);

    let request = Request::post(format!("/renew_certificate/{}", identity))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"csr": csr_for(&AgentIdentity::new().to_string())}).to_string(),
        ))
        .unwrap();
    let (status, body) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "uuid_mismatch");
}

#[tokio::test]
async fn test_declined_registration_is_final() {
    let h = harness();
    let identity = AgentIdentity::new();

    let request = Request::post("/register_with_labels")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, AUTH)
        .body(Body::from(json!({"uuid": identity.to_string()}).to_string()))
        .unwrap();
    send(&h.router, request).await;

    h.store
        .promote(identity, RegistrationState::New, RegistrationState::Declined)
        .await
        .unwrap();

    let (status, body) = send(&h.router, status_request(identity)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "DECLINED");
    assert_eq!(h.store.list_by_state(RegistrationState::New).unwrap().count(), 0);
}

#[tokio::test]
async fn test_register_new_polls_until_certificate_issued() {
    let h = harness();
    let identity = AgentIdentity::new();
    let poll = || {
        Request::get(format!("/register_new_ongoing/{}", identity))
            .body(Body::empty())
            .unwrap()
    };

    let request = Request::post("/register_new")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, AUTH)
        .body(Body::from(
            json!({
                "uuid": identity.to_string(),
                "csr": csr_for(&identity.to_string()),
                "agent_labels": {"os": "linux"},
            })
            .to_string(),
        ))
        .unwrap();
    let (status, body) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["root_cert"], h.ca.root_certificate_pem());

    let (_, body) = send(&h.router, poll()).await;
    assert_eq!(body["status"], "InProgress");

    // Approved locally, host not activated upstream yet
    h.store
        .promote(identity, RegistrationState::New, RegistrationState::Ready)
        .await
        .unwrap();
    let (_, body) = send(&h.router, poll()).await;
    assert_eq!(body["status"], "InProgress");

    h.inventory.approve(identity, "web01", ConnectionMode::Pull);
    let (status, body) = send(&h.router, poll()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Success");
    assert_eq!(body["connection_mode"], "pull");

    let der = ::pem::parse(body["agent_cert"].as_str().unwrap().as_bytes()).unwrap();
    let (_, cert) = x509_parser::parse_x509_certificate(der.contents()).unwrap();
    let root = ::pem::parse(h.ca.root_certificate_pem().as_bytes()).unwrap();
    let (_, root) = x509_parser::parse_x509_certificate(root.contents()).unwrap();
    assert!(cert.verify_signature(Some(root.public_key())).is_ok());
}

#[tokio::test]
async fn test_register_new_declined_reports_reason() {
    let h = harness();
    let identity = AgentIdentity::new();

    let request = Request::post("/register_new")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, AUTH)
        .body(Body::from(
            json!({"uuid": identity.to_string(), "csr": csr_for(&identity.to_string())}).to_string(),
        ))
        .unwrap();
    send(&h.router, request).await;

    h.store
        .promote(identity, RegistrationState::New, RegistrationState::Declined)
        .await
        .unwrap();

    let request = Request::get(format!("/register_new_ongoing/{}", identity))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Declined");
    assert_eq!(body["reason"], "registration declined");
}
