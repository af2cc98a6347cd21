// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Thread-safe record of what the daemon is doing, read by the status endpoint.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use legible_sync::{Stage, SyncObserver, SyncResult};
use serde::{Serialize, Serializer};

/// Coarse daemon state: `idle -> syncing -> {idle | error} -> syncing ...`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Syncing,
    Error,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Snapshot of an in-flight sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncProgress {
    pub start_time: DateTime<Utc>,
    pub documents_total: usize,
    pub documents_processed: usize,
    pub current_document: String,
    pub stage: String,
}

/// Totals of the last completed sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(serialize_with = "nanos")]
    pub duration: Duration,
    pub total_documents: usize,
    pub processed_documents: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub skipped_count: usize,
}

impl From<&SyncResult> for SyncSummary {
    fn from(result: &SyncResult) -> Self {
        Self {
            start_time: result.started_at,
            end_time: result.finished_at,
            duration: result.duration,
            total_documents: result.total_documents,
            processed_documents: result.processed_documents,
            success_count: result.success_count(),
            failure_count: result.failure_count(),
            skipped_count: result.skipped_count(),
        }
    }
}

/// Body of `GET /status`. Absent values render as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaemonStatus {
    pub state: SyncState,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub next_sync_time: Option<DateTime<Utc>>,
    /// Nanoseconds, like the rest of the durations on the wire.
    #[serde(serialize_with = "optional_nanos")]
    pub sync_duration: Option<Duration>,
    pub error_message: Option<String>,
    pub current_sync: Option<SyncProgress>,
    pub last_sync_result: Option<SyncSummary>,
    pub uptime_seconds: u64,
}

#[derive(Debug)]
struct Inner {
    state: SyncState,
    last_sync_time: Option<DateTime<Utc>>,
    next_sync_time: Option<DateTime<Utc>>,
    sync_duration: Option<Duration>,
    error_message: Option<String>,
    current_sync: Option<SyncProgress>,
    last_sync_result: Option<SyncSummary>,
}

/// Every transition and every read goes through one mutex.
#[derive(Debug)]
pub struct StatusTracker {
    started: Instant,
    inner: Mutex<Inner>,
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusTracker {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            inner: Mutex::new(Inner {
                state: SyncState::Idle,
                last_sync_time: None,
                next_sync_time: None,
                sync_duration: None,
                error_message: None,
                current_sync: None,
                last_sync_result: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SyncState {
        self.lock().state
    }

    pub fn is_syncing(&self) -> bool {
        self.state() == SyncState::Syncing
    }

    /// Enter `syncing`, clear the previous error and open a progress snapshot.
    pub fn sync_started(&self, total_documents: usize) {
        let now = Utc::now();
        let mut inner = self.lock();
        inner.state = SyncState::Syncing;
        inner.last_sync_time = Some(now);
        inner.error_message = None;
        inner.current_sync = Some(SyncProgress {
            start_time: now,
            documents_total: total_documents,
            documents_processed: 0,
            current_document: String::new(),
            stage: String::new(),
        });
    }

    /// Ignored unless a sync is in flight.
    pub fn update_progress(&self, processed: usize, current_document: &str, stage: &str) {
        let mut inner = self.lock();
        if inner.state != SyncState::Syncing {
            return;
        }
        if let Some(progress) = inner.current_sync.as_mut() {
            progress.documents_processed = processed;
            progress.current_document = current_document.to_owned();
            progress.stage = stage.to_owned();
        }
    }

    pub fn sync_completed(&self, summary: SyncSummary) {
        let mut inner = self.lock();
        inner.state = SyncState::Idle;
        inner.current_sync = None;
        inner.error_message = None;
        inner.sync_duration = Some(summary.duration);
        inner.last_sync_result = Some(summary);
    }

    pub fn sync_failed(&self, error: impl fmt::Display, duration: Duration) {
        let message = error.to_string();
        let mut inner = self.lock();
        inner.state = SyncState::Error;
        inner.current_sync = None;
        inner.sync_duration = Some(duration);
        inner.error_message = Some(message);
    }

    pub fn set_next_sync_time(&self, at: DateTime<Utc>) {
        self.lock().next_sync_time = Some(at);
    }

    pub fn status(&self) -> DaemonStatus {
        let uptime_seconds = self.started.elapsed().as_secs();
        let inner = self.lock();
        DaemonStatus {
            state: inner.state,
            last_sync_time: inner.last_sync_time,
            next_sync_time: inner.next_sync_time,
            sync_duration: inner.sync_duration,
            error_message: inner.error_message.clone(),
            current_sync: inner.current_sync.clone(),
            last_sync_result: inner.last_sync_result.clone(),
            uptime_seconds,
        }
    }
}

impl SyncObserver for StatusTracker {
    fn documents_planned(&self, total: usize) {
        let mut inner = self.lock();
        if inner.state != SyncState::Syncing {
            return;
        }
        if let Some(progress) = inner.current_sync.as_mut() {
            progress.documents_total = total;
        }
    }

    fn stage_entered(&self, processed: usize, document: &str, stage: Stage) {
        self.update_progress(processed, document, stage.as_str());
    }
}

fn nanos<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
}

fn optional_nanos<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => nanos(d, s),
        None => s.serialize_none(),
    }
}
