// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline stages and the progress hook the daemon listens on.

use std::fmt;

/// One step of the per-document pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Download,
    Convert,
    Ocr,
    Embed,
    Relocate,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Download => "downloading",
            Self::Convert => "converting",
            Self::Ocr => "ocr",
            Self::Embed => "enhancing",
            Self::Relocate => "saving",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives progress from a running sync. Calls come from the sync thread.
pub trait SyncObserver: Send + Sync {
    /// The diff is done and `total` documents will go through the pipeline.
    fn documents_planned(&self, total: usize);

    /// `processed` documents are finished; `document` has entered `stage`.
    fn stage_entered(&self, processed: usize, document: &str, stage: Stage);
}
