// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP routes of the agent receiver
//!
//! Transport only: path, header and body decoding, Basic credentials and
//! the mapping of [`ReceiverError`] to status codes. Every error body is
//! `{"kind": ..., "detail": ...}`.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `POST /pairing` | [`PairingService::pair`] |
//! | `POST /register_with_hostname` | [`RegistrationWorkflow::register_with_hostname`] |
//! | `POST /register_with_labels` | [`RegistrationWorkflow::register_with_labels`] |
//! | `POST /register_new` | [`RegistrationWorkflow::register_new`] |
//! | `GET /register_new_ongoing/{uuid}` | [`RegistrationWorkflow::register_new_ongoing`] |
//! | `POST /register_existing` | [`RegistrationWorkflow::register_existing`] |
//! | `POST /renew_certificate/{uuid}` | [`RegistrationWorkflow::renew_certificate`] |
//! | `POST /agent_data/{uuid}` | [`DataIngestGate::ingest`] |
//! | `GET /registration_status/{uuid}` | [`RegistrationWorkflow::registration_status`] |
//! | `GET /health` | liveness |

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

use crate::application::{DataIngestGate, PairingService, RegistrationWorkflow};
use crate::domain::error::ReceiverError;
use crate::domain::identity::{AgentIdentity, AgentLabels, Credentials};

pub const COMPRESSION_HEADER: &str = "compression";

pub struct AppState {
    pub pairing: Arc<PairingService>,
    pub workflow: Arc<RegistrationWorkflow>,
    pub ingest: Arc<DataIngestGate>,
    /// Advertised back-off when the upstream is unavailable
    pub retry_after_secs: u64,
    pub start_time: Instant,
}

impl AppState {
    fn fail(&self, error: ReceiverError) -> ApiError {
        ApiError {
            error,
            retry_after_secs: Some(self.retry_after_secs),
        }
    }
}

pub fn app(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/pairing", post(pairing_handler))
        .route("/register_with_hostname", post(register_with_hostname_handler))
        .route("/register_with_labels", post(register_with_labels_handler))
        .route("/register_new", post(register_new_handler))
        .route("/register_new_ongoing/{uuid}", get(register_new_ongoing_handler))
        .route("/register_existing", post(register_existing_handler))
        .route("/renew_certificate/{uuid}", post(renew_certificate_handler))
        .route("/agent_data/{uuid}", post(agent_data_handler))
        .route("/registration_status/{uuid}", get(registration_status_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// A [`ReceiverError`] on its way to the client
#[derive(Debug)]
pub struct ApiError {
    pub error: ReceiverError,
    pub retry_after_secs: Option<u64>,
}

impl From<ReceiverError> for ApiError {
    fn from(error: ReceiverError) -> Self {
        Self {
            error,
            retry_after_secs: None,
        }
    }
}

pub fn status_code(error: &ReceiverError) -> StatusCode {
    match error {
        ReceiverError::InvalidIdentity(_)
        | ReceiverError::MalformedCsr(_)
        | ReceiverError::UuidMismatch { .. }
        | ReceiverError::DecompressionFailed(_)
        | ReceiverError::SiteMismatch { .. }
        | ReceiverError::ClusterHostRejected(_)
        | ReceiverError::UpstreamRejected(_) => StatusCode::BAD_REQUEST,
        ReceiverError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        ReceiverError::Forbidden(_) => StatusCode::FORBIDDEN,
        ReceiverError::HostNotFound(_) | ReceiverError::NotRegistered(_) => StatusCode::NOT_FOUND,
        ReceiverError::AlreadyExists(_) => StatusCode::CONFLICT,
        ReceiverError::UnsupportedCompression(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ReceiverError::UnsupportedEdition => StatusCode::NOT_IMPLEMENTED,
        ReceiverError::CaUnavailable(_) | ReceiverError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ReceiverError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_code(&self.error);
        if status.is_server_error() {
            tracing::error!(kind = self.error.kind(), error = %self.error, "Request failed");
        } else {
            tracing::info!(kind = self.error.kind(), error = %self.error, "Request rejected");
        }

        let body = Json(json!({
            "kind": self.error.kind(),
            "detail": self.error.to_string(),
        }));
        let mut response = (status, body).into_response();

        match &self.error {
            ReceiverError::UpstreamUnavailable(_) => {
                if let Some(secs) = self.retry_after_secs {
                    response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(secs));
                }
            }
            ReceiverError::Unauthorized(_) => {
                response.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static("Basic realm=\"agent-receiver\""),
                );
            }
            _ => {}
        }
        response
    }
}

/// Username and password from an `Authorization: Basic` header
pub fn basic_credentials(headers: &HeaderMap) -> Result<Credentials, ReceiverError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ReceiverError::Unauthorized("missing basic credentials".to_string()))?;

    let (scheme, encoded) = value
        .split_once(' ')
        .ok_or_else(|| ReceiverError::Unauthorized("malformed authorization header".to_string()))?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(ReceiverError::Unauthorized(format!("unsupported authorization scheme '{}'", scheme)));
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| ReceiverError::Unauthorized("malformed basic credentials".to_string()))?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| ReceiverError::Unauthorized("malformed basic credentials".to_string()))?;

    Ok(Credentials::new(username, password))
}

fn parse_identity(raw: &str) -> Result<AgentIdentity, ReceiverError> {
    AgentIdentity::from_string(raw).map_err(|_| ReceiverError::InvalidIdentity(raw.to_string()))
}

#[derive(Deserialize)]
pub struct PairingRequest {
    pub csr: String,
}

#[derive(Deserialize)]
pub struct RegisterWithHostnameRequest {
    pub uuid: String,
    pub host_name: String,
}

#[derive(Deserialize)]
pub struct RegisterWithLabelsRequest {
    pub uuid: String,
    #[serde(default)]
    pub agent_labels: AgentLabels,
}

#[derive(Deserialize)]
pub struct RegisterNewRequest {
    pub uuid: String,
    pub csr: String,
    #[serde(default)]
    pub agent_labels: AgentLabels,
}

#[derive(Deserialize)]
pub struct RegisterExistingRequest {
    pub uuid: String,
    pub host_name: String,
    pub csr: String,
}

#[derive(Deserialize)]
pub struct RenewCertificateRequest {
    pub csr: String,
}

#[derive(Serialize)]
pub struct RenewCertificateResponse {
    pub agent_cert: String,
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

async fn pairing_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<PairingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let credentials = basic_credentials(&headers)?;
    let result = state
        .pairing
        .pair(&credentials, &request.csr)
        .await
        .map_err(|e| state.fail(e))?;
    Ok(Json(result))
}

async fn register_with_hostname_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<RegisterWithHostnameRequest>,
) -> Result<StatusCode, ApiError> {
    let credentials = basic_credentials(&headers)?;
    let identity = parse_identity(&request.uuid)?;
    state
        .workflow
        .register_with_hostname(&credentials, identity, &request.host_name)
        .await
        .map_err(|e| state.fail(e))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn register_with_labels_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<RegisterWithLabelsRequest>,
) -> Result<StatusCode, ApiError> {
    let credentials = basic_credentials(&headers)?;
    let identity = parse_identity(&request.uuid)?;
    state
        .workflow
        .register_with_labels(&credentials, identity, request.agent_labels)
        .await
        .map_err(|e| state.fail(e))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn register_new_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<RegisterNewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let credentials = basic_credentials(&headers)?;
    let identity = parse_identity(&request.uuid)?;
    let registration = state
        .workflow
        .register_new(&credentials, identity, request.agent_labels, &request.csr)
        .await
        .map_err(|e| state.fail(e))?;
    Ok(Json(registration))
}

async fn register_new_ongoing_handler(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = parse_identity(&uuid)?;
    let outcome = state
        .workflow
        .register_new_ongoing(identity)
        .await
        .map_err(|e| state.fail(e))?;
    Ok(Json(outcome))
}

async fn register_existing_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<RegisterExistingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let credentials = basic_credentials(&headers)?;
    let identity = parse_identity(&request.uuid)?;
    let registration = state
        .workflow
        .register_existing(&credentials, identity, &request.host_name, &request.csr)
        .await
        .map_err(|e| state.fail(e))?;
    Ok(Json(registration))
}

async fn renew_certificate_handler(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
    Json(request): Json<RenewCertificateRequest>,
) -> Result<Json<RenewCertificateResponse>, ApiError> {
    let identity = parse_identity(&uuid)?;
    let certificate = state
        .workflow
        .renew_certificate(identity, &request.csr)
        .await
        .map_err(|e| state.fail(e))?;
    Ok(Json(RenewCertificateResponse {
        agent_cert: certificate.pem,
    }))
}

async fn agent_data_handler(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let identity = parse_identity(&uuid)?;
    let compression = headers.get(COMPRESSION_HEADER).and_then(|v| v.to_str().ok());

    state
        .ingest
        .ingest(identity, compression, body)
        .await
        .map_err(|e| state.fail(e))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn registration_status_handler(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = parse_identity(&uuid)?;
    let status = state
        .workflow
        .registration_status(identity)
        .await
        .map_err(|e| state.fail(e))?;
    Ok(Json(status))
}
