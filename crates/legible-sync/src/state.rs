// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// State store — loads, queries, and atomically persists the sync ledger.
//
// The ledger sits behind a mutex so status readers can query it while the
// orchestration thread mutates it. Saves serialise a snapshot under the lock
// and write it outside, via a temp file renamed over the target.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use legible_core::error::{LegibleError, Result};
use tracing::{debug, info, instrument};

use crate::ledger::{ConversionStatus, DocumentRecord, LEDGER_FORMAT_VERSION, SyncLedger};

pub struct StateStore {
    path: PathBuf,
    ledger: Mutex<SyncLedger>,
}

impl StateStore {
    /// A store with an empty in-memory ledger. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ledger: Mutex::new(SyncLedger::new()),
        }
    }

    /// Load the ledger, creating and persisting an empty one when the file
    /// does not exist yet.
    pub fn load_or_create(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(path);
        store.load()?;
        if store.lock().is_fresh() {
            store.save()?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, SyncLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Persistence ----------------------------------------------------------

    /// Replace the in-memory ledger with the file's contents.
    ///
    /// A missing file yields an empty ledger. An unreadable, unparsable, or
    /// wrong-version file is an error and leaves memory untouched.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<()> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no ledger file, starting empty");
                *self.lock() = SyncLedger::new();
                return Ok(());
            }
            Err(e) => {
                return Err(LegibleError::State(format!(
                    "cannot read ledger {}: {e}",
                    self.path.display()
                )));
            }
        };

        let ledger: SyncLedger = serde_json::from_slice(&raw).map_err(|e| {
            LegibleError::State(format!("corrupt ledger {}: {e}", self.path.display()))
        })?;
        if ledger.version != LEDGER_FORMAT_VERSION {
            return Err(LegibleError::State(format!(
                "unsupported ledger version {} (expected {LEDGER_FORMAT_VERSION})",
                ledger.version
            )));
        }

        debug!(documents = ledger.documents.len(), "ledger loaded");
        *self.lock() = ledger;
        Ok(())
    }

    /// Write the ledger atomically.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn save(&self) -> Result<()> {
        let data = serde_json::to_vec_pretty(&*self.lock())?;

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    LegibleError::State(format!("cannot create {}: {e}", dir.display()))
                })?;
            }
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, &data)
            .map_err(|e| LegibleError::State(format!("cannot write {}: {e}", tmp.display())))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(LegibleError::State(format!(
                "cannot replace {}: {e}",
                self.path.display()
            )));
        }

        debug!(bytes = data.len(), "ledger saved");
        Ok(())
    }

    // -- Records --------------------------------------------------------------

    pub fn get(&self, id: &str) -> Option<DocumentRecord> {
        self.lock().get(id).cloned()
    }

    pub fn upsert(&self, record: DocumentRecord) {
        self.lock().upsert(record);
    }

    pub fn remove(&self, id: &str) -> Option<DocumentRecord> {
        self.lock().remove(id)
    }

    pub fn by_label(&self, label: &str) -> Vec<DocumentRecord> {
        self.lock().by_label(label).into_iter().cloned().collect()
    }

    pub fn by_status(&self, status: ConversionStatus) -> Vec<DocumentRecord> {
        self.lock().by_status(status).into_iter().cloned().collect()
    }

    pub fn needing_ocr(&self) -> Vec<DocumentRecord> {
        self.lock().needing_ocr().into_iter().cloned().collect()
    }

    pub fn path_owner(&self, path: &Path) -> Option<String> {
        self.lock().path_owner(path).map(str::to_owned)
    }

    pub fn count(&self) -> usize {
        self.lock().documents.len()
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.lock().last_sync
    }

    pub fn touch_last_sync(&self, at: DateTime<Utc>) {
        self.lock().last_sync = Some(at);
    }

    /// Forget every record. Not persisted until the next save.
    pub fn reset(&self) {
        info!(path = %self.path.display(), "ledger reset");
        *self.lock() = SyncLedger::new();
    }

    pub fn snapshot(&self) -> SyncLedger {
        self.lock().clone()
    }
}
