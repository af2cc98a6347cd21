// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Remote document store seam.

use std::path::Path;

use legible_core::RemoteDocument;
use legible_core::error::Result;

/// Lists, downloads, and locates documents in the remote store.
///
/// Every call carries the current user token; the orchestrator refreshes it
/// before each one. Implementations should return `LegibleError::Auth` when
/// the store rejects the token so the run can stop early.
pub trait DocumentSource: Send + Sync {
    /// Documents carrying any of `labels`, or every document when empty.
    fn list(&self, user_token: &str, labels: &[String]) -> Result<Vec<RemoteDocument>>;

    /// Write the document's archive to `dest`.
    fn download(&self, user_token: &str, id: &str, dest: &Path) -> Result<()>;

    /// Slash-separated folder names from the root to the document's parent.
    /// Empty for documents at the root.
    fn folder_path(&self, user_token: &str, id: &str) -> Result<String>;
}
