// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Receiver Configuration Types
//
// Defines the configuration schema for an agent receiver process:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Site identity (must match the upstream host objects it accepts)
// - Filesystem locations of the root CA, registration queues and agent output
// - Upstream inventory endpoint, credentials and timeout
// - Ingest limits and back-off hints for agents

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_VERSION: &str = "agent-receiver/v1";
pub const KIND: &str = "ReceiverConfig";
pub const CONFIG_PATH_ENV: &str = "AGENT_RECEIVER_CONFIG_PATH";

/// Top-level Kubernetes-style receiver configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// API version (must be "agent-receiver/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "ReceiverConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: ReceiverConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable receiver name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfigSpec {
    /// Site this receiver belongs to. Hosts of other sites are rejected.
    #[serde(default)]
    pub site: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub inventory: InventoryConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    /// Seconds agents are told to wait after an upstream outage
    #[serde(default = "default_retry_after_secs")]
    pub retry_after_secs: u64,

    /// Prometheus exporter port (disabled when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Combined PEM: root certificate plus unencrypted private key
    #[serde(default = "default_root_ca")]
    pub root_ca: PathBuf,

    /// One subdirectory per registration state lives here
    #[serde(default = "default_registration_root")]
    pub registration_root: PathBuf,

    /// One subdirectory per agent identity lives here
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Base URL of the upstream REST API
    #[serde(default = "default_inventory_url")]
    pub url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Automation user for calls the receiver makes on its own behalf
    #[serde(default = "default_automation_user")]
    pub username: String,

    /// Automation secret (supports "env:VAR_NAME")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_max_decompressed_bytes")]
    pub max_decompressed_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root_ca: default_root_ca(),
            registration_root: default_registration_root(),
            data_root: default_data_root(),
        }
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            url: default_inventory_url(),
            timeout_secs: default_timeout_secs(),
            username: default_automation_user(),
            secret: None,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_decompressed_bytes: default_max_decompressed_bytes(),
        }
    }
}

impl Default for ReceiverConfigSpec {
    fn default() -> Self {
        Self {
            site: String::new(),
            server: ServerConfig::default(),
            paths: PathsConfig::default(),
            inventory: InventoryConfig::default(),
            ingest: IngestConfig::default(),
            retry_after_secs: default_retry_after_secs(),
            metrics_port: None,
        }
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "agent-receiver".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                labels: None,
            },
            spec: ReceiverConfigSpec::default(),
        }
    }
}

impl InventoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve the automation secret, following "env:VAR_NAME" indirection
    pub fn resolve_secret(&self) -> anyhow::Result<Option<String>> {
        match self.secret.as_deref() {
            None => Ok(None),
            Some(value) => match value.strip_prefix("env:") {
                Some(var) => std::env::var(var)
                    .map(Some)
                    .map_err(|_| anyhow::anyhow!("Environment variable '{}' for inventory.secret is not set", var)),
                None => Ok(Some(value.to_string())),
            },
        }
    }
}

impl ReceiverConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. AGENT_RECEIVER_CONFIG_PATH environment variable
    /// 2. ./agent-receiver.yaml (working directory)
    /// 3. ~/.agent-receiver/config.yaml (user home)
    /// 4. /etc/agent-receiver/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./agent-receiver.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".agent-receiver").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/agent-receiver/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    /// This allows container deployments to override config via env vars
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(site) = lookup("AGENT_RECEIVER_SITE") {
            tracing::info!("Environment override: AGENT_RECEIVER_SITE={}", site);
            self.spec.site = site;
        }

        if let Some(url) = lookup("AGENT_RECEIVER_INVENTORY_URL") {
            tracing::info!("Environment override: AGENT_RECEIVER_INVENTORY_URL={}", url);
            self.spec.inventory.url = url;
        }

        if let Some(val) = lookup("AGENT_RECEIVER_INVENTORY_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => {
                    tracing::info!("Environment override: AGENT_RECEIVER_INVENTORY_TIMEOUT_SECS={}", secs);
                    self.spec.inventory.timeout_secs = secs;
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for AGENT_RECEIVER_INVENTORY_TIMEOUT_SECS: '{}'. Expected seconds. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!("Invalid apiVersion: '{}'. Must be '{}'", self.api_version, API_VERSION);
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.site.is_empty() {
            anyhow::bail!("spec.site cannot be empty");
        }

        let url = &self.spec.inventory.url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("spec.inventory.url must be an http(s) URL, got '{}'", url);
        }

        if self.spec.inventory.timeout_secs == 0 {
            anyhow::bail!("spec.inventory.timeout_secs must be greater than zero");
        }

        if self.spec.ingest.max_decompressed_bytes == 0 {
            anyhow::bail!("spec.ingest.max_decompressed_bytes must be greater than zero");
        }

        if self.spec.server.max_body_bytes == 0 {
            anyhow::bail!("spec.server.max_body_bytes must be greater than zero");
        }

        if self.spec.paths.registration_root == self.spec.paths.data_root {
            anyhow::bail!("spec.paths.registration_root and spec.paths.data_root must differ");
        }

        Ok(())
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_root_ca() -> PathBuf {
    PathBuf::from("/etc/agent-receiver/ca.pem")
}

fn default_registration_root() -> PathBuf {
    PathBuf::from("/var/lib/agent-receiver/registration")
}

fn default_data_root() -> PathBuf {
    PathBuf::from("/var/lib/agent-receiver/received-outputs")
}

fn default_inventory_url() -> String {
    "http://localhost/api/1.0".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_automation_user() -> String {
    "automation".to_string()
}

fn default_max_decompressed_bytes() -> u64 {
    64 * 1024 * 1024
}

fn default_retry_after_secs() -> u64 {
    60
}
