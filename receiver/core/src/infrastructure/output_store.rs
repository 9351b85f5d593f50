// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent Output Store
//!
//! Keeps the latest decompressed upload of every push agent at
//! `<data_root>/<uuid>/agent_output`. Each write goes to a temp file in the
//! same directory and is renamed over the previous output, so the fetcher on
//! the monitoring side never reads a half-written payload.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::domain::identity::AgentIdentity;
use crate::infrastructure::registration_store::create_private_dir_all;

pub const AGENT_OUTPUT_FILE: &str = "agent_output";

/// Group readable so the monitoring side's fetcher can open it
pub const OUTPUT_FILE_MODE: u32 = 0o660;

pub struct AgentOutputStore {
    data_root: PathBuf,
}

impl AgentOutputStore {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn output_path(&self, identity: AgentIdentity) -> PathBuf {
        self.data_root.join(identity.to_string()).join(AGENT_OUTPUT_FILE)
    }

    /// Replace the agent's output with `payload`.
    ///
    /// On failure the temp file is removed and any previous output stays.
    pub async fn write(&self, identity: AgentIdentity, payload: Vec<u8>) -> std::io::Result<PathBuf> {
        let dir = self.data_root.join(identity.to_string());
        create_private_dir_all(&dir).await?;
        let target = dir.join(AGENT_OUTPUT_FILE);

        let written = target.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut file = tempfile::NamedTempFile::new_in(&dir)?;
            file.write_all(&payload)?;
            set_output_mode(file.as_file())?;
            file.as_file().sync_all()?;
            file.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(std::io::Error::other)??;

        Ok(written)
    }
}

/// Temp files start out as 0600
#[cfg(unix)]
fn set_output_mode(file: &std::fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(OUTPUT_FILE_MODE))
}

#[cfg(not(unix))]
fn set_output_mode(_file: &std::fs::File) -> std::io::Result<()> {
    Ok(())
}
