// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// legible-daemon — scheduled syncs and the status surface.

pub mod daemon;
pub mod pidfile;
pub mod server;
pub mod status;

pub use daemon::{Daemon, SyncRunner, Termination};
pub use pidfile::PidFile;
pub use server::{ControlResponse, StatusServer, router};
pub use status::{DaemonStatus, StatusTracker, SyncProgress, SyncState, SyncSummary};
