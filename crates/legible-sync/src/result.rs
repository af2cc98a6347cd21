// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Outcome of one sync run.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSuccess {
    pub document_id: String,
    pub title: String,
    pub page_count: usize,
    pub output_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentFailure {
    pub document_id: String,
    pub title: String,
    pub error: String,
}

/// Built by the orchestrator, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Documents in the (deduplicated, filtered) listing.
    pub total_documents: usize,
    /// Documents that needed a pipeline run.
    pub processed_documents: usize,
    pub successes: Vec<DocumentSuccess>,
    pub failures: Vec<DocumentFailure>,
    pub duration: Duration,
}

impl SyncResult {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            total_documents: 0,
            processed_documents: 0,
            successes: Vec::new(),
            failures: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Listed documents that were already current.
    pub fn skipped_count(&self) -> usize {
        self.total_documents.saturating_sub(self.processed_documents)
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sync Summary:")?;
        writeln!(f, "  Total Documents: {}", self.total_documents)?;
        writeln!(f, "  Processed: {}", self.processed_documents)?;
        writeln!(f, "  Successful: {}", self.success_count())?;
        writeln!(f, "  Failed: {}", self.failure_count())?;
        writeln!(f, "  Duration: {:.2?}", self.duration)?;
        if self.has_failures() {
            writeln!(f)?;
            writeln!(f, "Failures:")?;
            for failure in &self.failures {
                writeln!(f, "  - {} ({}): {}", failure.title, failure.document_id, failure.error)?;
            }
        }
        Ok(())
    }
}
