// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Legible — Core types, configuration, and errors shared across all crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::{DaemonConfig, LegibleConfig, OcrConfig, OcrProvider};
pub use error::{ErrorClass, LegibleError, Result};
pub use types::*;
