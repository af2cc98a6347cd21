// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sync ledger — one record per tracked document, plus the reconciliation
// predicates that decide what a run has to redo.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use legible_core::DocumentKind;
use legible_core::error::{LegibleError, Result};
use legible_security::verify_file;
use serde::{Deserialize, Serialize};

/// Ledger file format version this build reads and writes.
pub const LEDGER_FORMAT_VERSION: u32 = 1;

/// Where a document is in its conversion cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStatus {
    /// Not attempted yet.
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    /// Nothing to convert, e.g. the source was already a PDF.
    Skipped,
}

impl ConversionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Completed | Self::Failed | Self::Skipped => 2,
        }
    }

    /// Forward moves only: pending, then in progress, then one terminal state.
    pub fn can_advance_to(&self, next: ConversionStatus) -> bool {
        next.rank() > self.rank()
    }
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sync state of a single document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub name: String,
    /// Remote version the local output was built from.
    pub version: i64,
    #[serde(default)]
    pub modified_client: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_synced: Option<DateTime<Utc>>,
    #[serde(default)]
    pub local_path: Option<PathBuf>,
    /// SHA-256 of the output file, hex encoded.
    #[serde(default)]
    pub hash: String,
    #[serde(rename = "type", default)]
    pub kind: DocumentKind,
    #[serde(default)]
    pub parent: String,
    #[serde(default)]
    pub ocr_processed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    conversion_status: ConversionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

impl DocumentRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: DocumentKind, parent: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: 0,
            modified_client: None,
            last_synced: None,
            local_path: None,
            hash: String::new(),
            kind,
            parent: parent.into(),
            ocr_processed: false,
            ocr_timestamp: None,
            conversion_status: ConversionStatus::Pending,
            error: None,
            retry_count: 0,
            labels: Vec::new(),
        }
    }

    pub fn conversion_status(&self) -> ConversionStatus {
        self.conversion_status
    }

    /// Move the conversion status forward. Backward moves are rejected.
    pub fn set_conversion_status(&mut self, next: ConversionStatus) -> Result<()> {
        if !self.conversion_status.can_advance_to(next) {
            return Err(LegibleError::State(format!(
                "document {}: conversion status cannot go from {} to {next}",
                self.id, self.conversion_status
            )));
        }
        self.conversion_status = next;
        Ok(())
    }

    /// Start a fresh conversion cycle.
    pub fn reset_conversion(&mut self) {
        self.conversion_status = ConversionStatus::Pending;
    }

    /// Whether the remote copy has to be pulled again.
    ///
    /// Checks, in order: never synced, newer remote version, newer remote
    /// modification time (whole seconds), then a missing local output file or
    /// one whose content no longer matches the stored hash.
    pub fn needs_sync(&self, remote_version: i64, remote_modified: DateTime<Utc>) -> bool {
        if self.last_synced.is_none() {
            return true;
        }
        if remote_version > self.version {
            return true;
        }
        match self.modified_client {
            Some(stored) if remote_modified.timestamp() <= stored.timestamp() => {}
            _ => return true,
        }
        match &self.local_path {
            Some(path) if !path.exists() => true,
            Some(_) if self.hash.is_empty() => false,
            Some(path) => verify_file(path, &self.hash).is_err(),
            None => true,
        }
    }

    /// Whether a completed conversion still lacks a current OCR pass.
    pub fn needs_ocr(&self) -> bool {
        if self.conversion_status != ConversionStatus::Completed {
            return false;
        }
        if !self.ocr_processed {
            return true;
        }
        match (self.last_synced, self.ocr_timestamp) {
            (Some(synced), Some(ocr)) => synced > ocr,
            (_, None) => true,
            (None, Some(_)) => false,
        }
    }

    /// Record a successful sync of `version`.
    pub fn mark_synced(
        &mut self,
        version: i64,
        modified_client: DateTime<Utc>,
        local_path: PathBuf,
        hash: String,
        now: DateTime<Utc>,
    ) {
        self.version = version;
        self.modified_client = Some(modified_client);
        self.last_synced = Some(now);
        self.local_path = Some(local_path);
        self.hash = hash;
        self.error = None;
        self.retry_count = 0;
    }

    pub fn mark_error(&mut self, error: &str) {
        self.error = Some(error.to_owned());
        self.retry_count += 1;
    }

    pub fn mark_ocr_complete(&mut self, now: DateTime<Utc>) {
        self.ocr_processed = true;
        self.ocr_timestamp = Some(now);
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// The persisted ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLedger {
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub documents: BTreeMap<String, DocumentRecord>,
    pub version: u32,
}

impl Default for SyncLedger {
    fn default() -> Self {
        Self {
            last_sync: None,
            documents: BTreeMap::new(),
            version: LEDGER_FORMAT_VERSION,
        }
    }
}

impl SyncLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fresh(&self) -> bool {
        self.documents.is_empty() && self.last_sync.is_none()
    }

    pub fn get(&self, id: &str) -> Option<&DocumentRecord> {
        self.documents.get(id)
    }

    pub fn upsert(&mut self, record: DocumentRecord) {
        self.documents.insert(record.id.clone(), record);
    }

    pub fn remove(&mut self, id: &str) -> Option<DocumentRecord> {
        self.documents.remove(id)
    }

    pub fn by_label(&self, label: &str) -> Vec<&DocumentRecord> {
        self.documents.values().filter(|r| r.has_label(label)).collect()
    }

    pub fn by_status(&self, status: ConversionStatus) -> Vec<&DocumentRecord> {
        self.documents
            .values()
            .filter(|r| r.conversion_status == status)
            .collect()
    }

    pub fn needing_ocr(&self) -> Vec<&DocumentRecord> {
        self.documents.values().filter(|r| r.needs_ocr()).collect()
    }

    /// Id of the record whose output lives at `path`, if any.
    pub fn path_owner(&self, path: &Path) -> Option<&str> {
        self.documents
            .values()
            .find(|r| r.local_path.as_deref() == Some(path))
            .map(|r| r.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn synced_record(dir: &std::path::Path, version: i64, modified: DateTime<Utc>) -> DocumentRecord {
        let output = dir.join("notes.pdf");
        std::fs::write(&output, b"%PDF-1.7").expect("write output");
        let hash = legible_security::hash_file(&output).expect("hash output");
        let mut record = DocumentRecord::new("doc", "Notes", DocumentKind::Notebook, "");
        record.mark_synced(version, modified, output, hash, Utc::now());
        record
    }

    #[test]
    fn never_synced_needs_sync() {
        let record = DocumentRecord::new("doc", "Notes", DocumentKind::Notebook, "");
        assert!(record.needs_sync(0, Utc::now()));
    }

    #[test]
    fn unchanged_document_with_output_is_current() {
        let dir = tempfile::tempdir().expect("tempdir");
        let modified = Utc::now();
        let record = synced_record(dir.path(), 3, modified);
        assert!(!record.needs_sync(3, modified));
    }

    #[test]
    fn newer_version_needs_sync_even_with_output_present() {
        let dir = tempfile::tempdir().expect("tempdir");
        let modified = Utc::now();
        let record = synced_record(dir.path(), 1, modified);
        assert!(record.needs_sync(2, modified));
    }

    #[test]
    fn missing_output_file_self_heals() {
        let dir = tempfile::tempdir().expect("tempdir");
        let modified = Utc::now();
        let record = synced_record(dir.path(), 1, modified);
        std::fs::remove_file(dir.path().join("notes.pdf")).expect("remove output");
        assert!(record.needs_sync(1, modified));

        let mut no_path = record.clone();
        no_path.local_path = None;
        assert!(no_path.needs_sync(1, modified));
    }

    #[test]
    fn replaced_output_file_self_heals() {
        let dir = tempfile::tempdir().expect("tempdir");
        let modified = Utc::now();
        let record = synced_record(dir.path(), 1, modified);
        assert!(!record.needs_sync(1, modified));

        std::fs::write(dir.path().join("notes.pdf"), b"%PDF-1.7 edited elsewhere")
            .expect("overwrite output");
        assert!(record.needs_sync(1, modified));

        let mut unhashed = record.clone();
        unhashed.hash.clear();
        assert!(!unhashed.needs_sync(1, modified));
    }

    #[test]
    fn modification_time_compares_whole_seconds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stored = DateTime::from_timestamp(1_700_000_000, 100_000_000).expect("timestamp");
        let record = synced_record(dir.path(), 1, stored);

        let same_second = DateTime::from_timestamp(1_700_000_000, 900_000_000).expect("timestamp");
        assert!(!record.needs_sync(1, same_second));
        assert!(record.needs_sync(1, stored + TimeDelta::seconds(1)));
    }

    #[test]
    fn status_only_moves_forward() {
        let mut record = DocumentRecord::new("doc", "Notes", DocumentKind::Notebook, "");
        record.set_conversion_status(ConversionStatus::InProgress).expect("start");
        record.set_conversion_status(ConversionStatus::Completed).expect("finish");
        assert!(record.set_conversion_status(ConversionStatus::InProgress).is_err());
        assert!(record.set_conversion_status(ConversionStatus::Failed).is_err());
        assert_eq!(record.conversion_status(), ConversionStatus::Completed);

        record.reset_conversion();
        record.set_conversion_status(ConversionStatus::InProgress).expect("restart");
    }

    #[test]
    fn needs_ocr_tracks_resyncs() {
        let mut record = DocumentRecord::new("doc", "Notes", DocumentKind::Notebook, "");
        assert!(!record.needs_ocr(), "pending conversion never needs OCR");

        record.set_conversion_status(ConversionStatus::Completed).expect("complete");
        assert!(record.needs_ocr());

        let t0 = Utc::now();
        record.last_synced = Some(t0);
        record.mark_ocr_complete(t0 + TimeDelta::seconds(1));
        assert!(!record.needs_ocr());

        record.last_synced = Some(t0 + TimeDelta::seconds(5));
        assert!(record.needs_ocr());
    }

    #[test]
    fn errors_accumulate_until_synced() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut record = synced_record(dir.path(), 1, Utc::now());
        record.mark_error("download failed");
        record.mark_error("download failed again");
        assert_eq!(record.retry_count, 2);

        record.mark_synced(2, Utc::now(), dir.path().join("notes.pdf"), "def".into(), Utc::now());
        assert_eq!(record.retry_count, 0);
        assert!(record.error.is_none());
    }

    #[test]
    fn record_json_uses_ledger_field_names() {
        let mut record = DocumentRecord::new("doc", "Notes", DocumentKind::Pdf, "folder");
        record.labels.push("work".into());
        let json = serde_json::to_value(&record).expect("serialise");
        assert_eq!(json["type"], "PdfType");
        assert_eq!(json["conversion_status"], "pending");
        assert_eq!(json["labels"][0], "work");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn ledger_queries() {
        let mut ledger = SyncLedger::new();
        let mut a = DocumentRecord::new("a", "A", DocumentKind::Notebook, "");
        a.labels.push("work".into());
        a.set_conversion_status(ConversionStatus::Completed).expect("complete");
        let mut b = DocumentRecord::new("b", "B", DocumentKind::Notebook, "");
        b.set_conversion_status(ConversionStatus::Failed).expect("fail");
        ledger.upsert(a);
        ledger.upsert(b);

        assert_eq!(ledger.by_label("work").len(), 1);
        assert_eq!(ledger.by_status(ConversionStatus::Failed)[0].id, "b");
        assert_eq!(ledger.needing_ocr()[0].id, "a");
        assert!(ledger.remove("a").is_some());
        assert!(ledger.get("a").is_none());
    }

    #[test]
    fn path_owner_finds_the_record_holding_an_output() {
        let mut ledger = SyncLedger::new();
        let mut a = DocumentRecord::new("a", "Notes", DocumentKind::Notebook, "");
        a.local_path = Some(PathBuf::from("/out/Notes.pdf"));
        ledger.upsert(a);
        ledger.upsert(DocumentRecord::new("b", "Notes", DocumentKind::Notebook, ""));

        assert_eq!(ledger.path_owner(Path::new("/out/Notes.pdf")), Some("a"));
        assert_eq!(ledger.path_owner(Path::new("/out/Other.pdf")), None);
    }
}
