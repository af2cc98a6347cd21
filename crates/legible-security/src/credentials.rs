// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Credential file — device and user tokens persisted with owner-only permissions.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use legible_core::error::{LegibleError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The two-token credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Long-lived token obtained by device registration.
    #[serde(default)]
    pub device_token: String,
    /// Short-lived bearer token derived from the device token.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_token: String,
}

impl Credentials {
    pub fn has_device_token(&self) -> bool {
        !self.device_token.is_empty()
    }
}

/// JSON credential file at a fixed path.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the credential file. A missing file yields empty credentials.
    pub fn load(&self) -> Result<Credentials> {
        if !self.path.exists() {
            return Ok(Credentials::default());
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            LegibleError::Auth(format!("cannot read token file {}: {e}", self.path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            LegibleError::Auth(format!(
                "cannot parse token file {}: {e}",
                self.path.display()
            ))
        })
    }

    /// Write the credential file, creating its directory, mode 0600.
    ///
    /// The new content goes to a sibling `.tmp` file that is renamed over the
    /// old one, so a failed write leaves the previous credentials readable.
    pub fn save(&self, creds: &Credentials) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            create_private_dir(dir)?;
        }
        let data = serde_json::to_vec_pretty(creds)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let written = open_private(&tmp).and_then(|mut file| {
            file.write_all(&data)?;
            file.sync_all()?;
            Ok(())
        });
        let replaced = written.and_then(|()| fs::rename(&tmp, &self.path).map_err(LegibleError::from));
        if let Err(e) = replaced {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        debug!(path = %self.path.display(), "credentials saved");
        Ok(())
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    if dir.as_os_str().is_empty() || dir.exists() {
        return Ok(());
    }
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

#[cfg(unix)]
fn open_private(path: &Path) -> Result<fs::File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation; tighten a pre-existing file too.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> Result<fs::File> {
    Ok(fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?)
}
