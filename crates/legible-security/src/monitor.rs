// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Token renewal monitor — counts user-token renewals and their spacing.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use legible_core::error::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::claims::{TokenKind, format_duration};

/// One recorded renewal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenewalEvent {
    pub timestamp: DateTime<Utc>,
    pub token_type: TokenKind,
    /// Lifetime of the new token, when it had an expiry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_for: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_since_last: Option<String>,
}

/// Aggregated renewal statistics, also the on-disk JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenStatistics {
    pub start_time: Option<DateTime<Utc>>,
    pub last_update: DateTime<Utc>,
    pub renewal_count: usize,
    pub renewal_events: Vec<RenewalEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_interval: Option<String>,
}

#[derive(Default)]
struct Inner {
    events: Vec<RenewalEvent>,
}

/// Thread-safe renewal recorder, optionally mirrored to a JSON file.
#[derive(Default)]
pub struct TokenMonitor {
    inner: Mutex<Inner>,
    stats_file: Option<PathBuf>,
}

impl TokenMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist statistics to `path` after every renewal.
    pub fn with_stats_file(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            stats_file: Some(path.into()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a renewal at the current time.
    pub fn record_renewal(&self, kind: TokenKind, valid_for: Option<TimeDelta>) {
        self.record_renewal_at(kind, valid_for, Utc::now());
    }

    pub fn record_renewal_at(&self, kind: TokenKind, valid_for: Option<TimeDelta>, at: DateTime<Utc>) {
        let count = {
            let mut inner = self.lock();
            let since_last = inner.events.last().map(|prev| at - prev.timestamp);
            inner.events.push(RenewalEvent {
                timestamp: at,
                token_type: kind,
                valid_for: valid_for.map(format_duration),
                time_since_last: since_last.map(format_duration),
            });
            info!(
                token_type = ?kind,
                renewal_count = inner.events.len(),
                valid_for = ?valid_for.map(format_duration),
                "token renewal tracked"
            );
            inner.events.len()
        };

        if let Some(path) = &self.stats_file {
            if let Err(e) = self.save_statistics(path) {
                warn!(error = %e, renewal_count = count, "failed to save token statistics");
            }
        }
    }

    pub fn renewal_count(&self) -> usize {
        self.lock().events.len()
    }

    pub fn statistics(&self) -> TokenStatistics {
        let inner = self.lock();
        let events = inner.events.clone();
        let average_interval = match (events.first(), events.last()) {
            (Some(first), Some(last)) if events.len() > 1 => {
                let span = last.timestamp - first.timestamp;
                Some(format_duration(span / (events.len() as i32 - 1)))
            }
            _ => None,
        };
        TokenStatistics {
            start_time: events.first().map(|e| e.timestamp),
            last_update: Utc::now(),
            renewal_count: events.len(),
            renewal_events: events,
            average_interval,
        }
    }

    fn save_statistics(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_vec_pretty(&self.statistics())?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Multi-line summary for the CLI.
    pub fn summary(&self) -> String {
        let stats = self.statistics();
        if stats.renewal_count == 0 {
            return "No token renewals recorded yet".into();
        }
        let mut out = format!("Total renewals: {}\n", stats.renewal_count);
        if let Some(avg) = &stats.average_interval {
            out.push_str(&format!("Average interval: {avg}\n"));
        }
        let skip = stats.renewal_events.len().saturating_sub(5);
        out.push_str("Recent renewals:\n");
        for (i, event) in stats.renewal_events.iter().enumerate().skip(skip) {
            out.push_str(&format!("  {}. {}", i + 1, event.timestamp.to_rfc3339()));
            if let Some(since) = &event.time_since_last {
                out.push_str(&format!(" (after {since})"));
            }
            out.push('\n');
        }
        out
    }
}
