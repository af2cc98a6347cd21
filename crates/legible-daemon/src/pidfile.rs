// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PID file written on start and removed on shutdown.

use std::path::{Path, PathBuf};

use legible_core::error::{LegibleError, Result};
use tracing::{info, warn};

#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write the current process id, newline-terminated.
    pub fn write(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let pid = std::process::id();
        std::fs::write(&path, format!("{pid}\n"))
            .map_err(|e| LegibleError::PidFile(format!("{}: {e}", path.display())))?;
        info!(pid, file = %path.display(), "wrote PID file");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best effort; failures are only logged.
    pub fn remove(self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!(file = %self.path.display(), "removed PID file"),
            Err(e) => warn!(file = %self.path.display(), error = %e, "failed to remove PID file"),
        }
    }
}
