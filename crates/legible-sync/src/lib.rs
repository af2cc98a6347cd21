// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// legible-sync — ledger persistence and the reconciliation pipeline.

pub mod context;
pub mod ledger;
pub mod orchestrator;
pub mod progress;
pub mod result;
pub mod sanitize;
pub mod source;
pub mod state;

pub use context::SyncContext;
pub use ledger::{ConversionStatus, DocumentRecord, LEDGER_FORMAT_VERSION, SyncLedger};
pub use orchestrator::{Collaborators, OcrStage, Orchestrator};
pub use progress::{Stage, SyncObserver};
pub use result::{DocumentFailure, DocumentSuccess, SyncResult};
pub use source::DocumentSource;
pub use state::StateStore;
