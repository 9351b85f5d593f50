// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Filesystem Registration Store
//!
//! Implements [`RegistrationStore`] with one directory per registration
//! state and one JSON file per agent identity:
//!
//! ```text
//! <registration_root>/
//!   NEW/<uuid>.json
//!   PENDING/<uuid>.json
//!   DECLINED/<uuid>.json
//!   READY/<uuid>.json
//!   DISCOVERABLE/<uuid>.json
//! ```
//!
//! A state transition is a single `rename(2)` between sibling directories,
//! so a reader sees a record in exactly one state. The external
//! administrative workflow moves files between `NEW`, `PENDING`, `DECLINED`
//! and `READY` the same way.
//!
//! **Limitations:**
//! - All state directories must live on one filesystem (rename is not atomic
//!   across mounts)
//! - No locking: concurrent creates for the same identity race on the final
//!   rename and the last writer wins. A re-submitted registration replaces
//!   the queued record.

use async_trait::async_trait;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::domain::identity::AgentIdentity;
use crate::domain::registration::{
    RegistrationError, RegistrationRecord, RegistrationRecords, RegistrationState, RegistrationStore,
    StoredRegistration,
};

/// Permissions of state directories (owner and group, no others)
pub const STATE_DIR_MODE: u32 = 0o770;

pub struct FilesystemRegistrationStore {
    /// Parent of the per-state directories
    root: PathBuf,
}

impl FilesystemRegistrationStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn state_dir(&self, state: RegistrationState) -> PathBuf {
        self.root.join(state.dir_name())
    }

    fn record_path(&self, state: RegistrationState, identity: AgentIdentity) -> PathBuf {
        self.state_dir(state).join(format!("{}.json", identity))
    }

    async fn ensure_state_dir(&self, state: RegistrationState) -> Result<PathBuf, RegistrationError> {
        let dir = self.state_dir(state);
        create_private_dir_all(&dir).await.map_err(|e| {
            RegistrationError::Io(format!("Failed to create directory {}: {}", dir.display(), e))
        })?;
        Ok(dir)
    }
}

/// `mkdir -p` with [`STATE_DIR_MODE`] on every created level
#[cfg(unix)]
pub(crate) async fn create_private_dir_all(dir: &Path) -> std::io::Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true).mode(STATE_DIR_MODE);
    builder.create(dir).await
}

#[cfg(not(unix))]
pub(crate) async fn create_private_dir_all(dir: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await
}

fn parse_record(path: &Path, bytes: &[u8]) -> Result<RegistrationRecord, RegistrationError> {
    serde_json::from_slice(bytes).map_err(|e| RegistrationError::Corrupt {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl RegistrationStore for FilesystemRegistrationStore {
    async fn submit(&self, record: RegistrationRecord) -> Result<(), RegistrationError> {
        let identity = record.uuid;
        let principal = record.username.clone();
        let dir = self.ensure_state_dir(RegistrationState::New).await?;
        let target = self.record_path(RegistrationState::New, identity);
        let content = serde_json::to_vec(&record)
            .map_err(|e| RegistrationError::Io(format!("Failed to serialize record: {}", e)))?;

        // Write next to the target, then rename over it
        tokio::task::spawn_blocking(move || -> Result<(), RegistrationError> {
            let mut file = tempfile::NamedTempFile::new_in(&dir)?;
            file.write_all(&content)?;
            file.as_file().sync_all()?;
            file.persist(&target).map_err(|e| {
                RegistrationError::Io(format!("Failed to persist {}: {}", target.display(), e.error))
            })?;
            Ok(())
        })
        .await
        .map_err(|e| RegistrationError::Io(format!("Write task failed: {}", e)))??;

        tracing::info!(agent = %identity, principal = %principal, "Registration record created in NEW");
        Ok(())
    }

    async fn get(&self, identity: AgentIdentity) -> Result<Option<StoredRegistration>, RegistrationError> {
        for state in RegistrationState::ALL {
            let path = self.record_path(state, identity);
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    let record = parse_record(&path, &bytes)?;
                    return Ok(Some(StoredRegistration { state, record }));
                }
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(RegistrationError::Io(format!(
                        "Failed to read {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }
        Ok(None)
    }

    async fn promote(
        &self,
        identity: AgentIdentity,
        from: RegistrationState,
        to: RegistrationState,
    ) -> Result<(), RegistrationError> {
        let source = self.record_path(from, identity);
        self.ensure_state_dir(to).await?;
        let target = self.record_path(to, identity);

        match tokio::fs::rename(&source, &target).await {
            Ok(()) => {
                tracing::info!(agent = %identity, from = %from, to = %to, "Registration promoted");
                Ok(())
            }
            // Not in `from` (anymore): someone else already moved it
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(agent = %identity, from = %from, "No registration to promote");
                Ok(())
            }
            Err(e) => Err(RegistrationError::Io(format!(
                "Failed to move {} to {}: {}",
                source.display(),
                target.display(),
                e
            ))),
        }
    }

    fn list_by_state(&self, state: RegistrationState) -> Result<RegistrationRecords, RegistrationError> {
        let dir = self.state_dir(state);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Box::new(std::iter::empty())),
            Err(e) => {
                return Err(RegistrationError::Io(format!(
                    "Failed to list {}: {}",
                    dir.display(),
                    e
                )))
            }
        };

        let records = entries.filter_map(|entry| {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => return Some(Err(RegistrationError::from(e))),
            };
            // Skip in-flight temp files and anything else that is not a record
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                return None;
            }
            Some(
                std::fs::read(&path)
                    .map_err(RegistrationError::from)
                    .and_then(|bytes| parse_record(&path, &bytes)),
            )
        });

        Ok(Box::new(records))
    }
}
