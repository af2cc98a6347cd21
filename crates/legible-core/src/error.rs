// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Legible.

use thiserror::Error;

/// Top-level error type for all Legible operations.
#[derive(Debug, Error)]
pub enum LegibleError {
    // -- Setup errors --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("missing required dependency: {0}")]
    MissingDependency(&'static str),

    // -- Authentication errors --
    #[error("authentication failed: {0}; re-authenticate by registering this device again")]
    Auth(String),

    #[error("not authenticated; register this device first")]
    NotAuthenticated,

    // -- Remote errors --
    #[error("remote request failed: {0}")]
    Remote(String),

    #[error("download failed: {0}")]
    Download(String),

    // -- Pipeline errors --
    #[error("conversion failed: {0}")]
    Conversion(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("malformed OCR output: {0}")]
    MalformedOcr(String),

    #[error("PDF operation failed: {0}")]
    Pdf(String),

    #[error("text layer embedding failed: {0}")]
    TextLayer(String),

    // -- Persistence --
    #[error("state persistence failed: {0}")]
    State(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    // -- Daemon --
    #[error("status server error: {0}")]
    Server(String),

    #[error("PID file error: {0}")]
    PidFile(String),

    // -- Cancellation --
    #[error("sync cancelled")]
    Cancelled,

    #[error("sync deadline exceeded")]
    DeadlineExceeded,
}

/// Error categories driving the propagate-or-capture decision during a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Missing dependency or bad configuration. Fatal.
    Setup,
    /// Listing, download, conversion or OCR failure. Isolated to one document.
    Transient,
    /// Credentials unusable. Aborts the whole sync.
    Authentication,
    /// Ledger could not be read or written. Logged, sync continues.
    Persistence,
    /// Unusable OCR word. Skipped.
    Malformed,
    /// Text layer could not be embedded. Falls back to the plain document.
    Embedding,
    /// Context cancelled or deadline exceeded.
    Cancelled,
}

impl LegibleError {
    /// Classify this error according to the sync error taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            LegibleError::Config(_)
            | LegibleError::MissingDependency(_)
            | LegibleError::Server(_)
            | LegibleError::PidFile(_) => ErrorClass::Setup,

            LegibleError::Auth(_) | LegibleError::NotAuthenticated => ErrorClass::Authentication,

            LegibleError::Remote(_)
            | LegibleError::Download(_)
            | LegibleError::Conversion(_)
            | LegibleError::Ocr(_)
            | LegibleError::Pdf(_)
            | LegibleError::Io(_) => ErrorClass::Transient,

            LegibleError::MalformedOcr(_) => ErrorClass::Malformed,
            LegibleError::TextLayer(_) => ErrorClass::Embedding,

            LegibleError::State(_)
            | LegibleError::Serialization(_)
            | LegibleError::IntegrityMismatch { .. } => ErrorClass::Persistence,

            LegibleError::Cancelled | LegibleError::DeadlineExceeded => ErrorClass::Cancelled,
        }
    }

    /// Whether this error must abort an in-progress sync rather than being
    /// recorded against a single document.
    pub fn aborts_sync(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Setup | ErrorClass::Authentication | ErrorClass::Cancelled
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LegibleError>;
