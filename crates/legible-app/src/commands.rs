// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subcommand implementations. Each returns the text to print.

use std::fmt::Write as _;
use std::path::Path;

use legible_core::DocumentOcr;
use legible_core::config::LegibleConfig;
use legible_core::error::{LegibleError, Result};
use legible_document::TextLayerEmbedder;
use legible_security::{CredentialStore, TokenInfo, TokenKind};
use legible_sync::{ConversionStatus, StateStore};

const ALL_STATUSES: [ConversionStatus; 5] = [
    ConversionStatus::Pending,
    ConversionStatus::InProgress,
    ConversionStatus::Completed,
    ConversionStatus::Failed,
    ConversionStatus::Skipped,
];

pub fn token_info(config: &LegibleConfig, json: bool) -> Result<String> {
    let creds = CredentialStore::new(&config.token_file).load()?;
    if !creds.has_device_token() {
        return Err(LegibleError::NotAuthenticated);
    }

    let mut infos = vec![TokenInfo::inspect(&creds.device_token, TokenKind::Device)];
    if !creds.user_token.is_empty() {
        infos.push(TokenInfo::inspect(&creds.user_token, TokenKind::User));
    }

    if json {
        let mut out = serde_json::to_string_pretty(&infos)?;
        out.push('\n');
        return Ok(out);
    }

    let mut out = String::new();
    for info in &infos {
        let title = match info.kind {
            TokenKind::Device => "Device token",
            TokenKind::User => "User token",
        };
        let _ = writeln!(out, "{title}:");
        let _ = writeln!(out, "  Status:         {}", info.status);
        if !info.device_desc.is_empty() {
            let _ = writeln!(out, "  Device:         {}", info.device_desc);
        }
        if !info.device_id.is_empty() {
            let _ = writeln!(out, "  Device ID:      {}", info.device_id);
        }
        if !info.scopes.is_empty() {
            let _ = writeln!(out, "  Scopes:         {}", info.scopes);
        }
        if let Some(iat) = info.issued_at {
            let _ = writeln!(out, "  Issued:         {}", iat.to_rfc3339());
        }
        if let Some(exp) = info.expires_at {
            let _ = writeln!(out, "  Expires:        {}", exp.to_rfc3339());
        }
        let _ = writeln!(out, "  Time remaining: {}", info.time_remaining);
    }
    Ok(out)
}

pub fn enhance(input: &Path, ocr_path: &Path, output: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(ocr_path)?;
    let ocr: DocumentOcr = serde_json::from_str(&raw)
        .map_err(|e| LegibleError::MalformedOcr(format!("{}: {e}", ocr_path.display())))?;
    let summary = TextLayerEmbedder::new().enhance_file(input, output, &ocr)?;
    Ok(format!(
        "Embedded {} words on {} pages into {}\n",
        summary.words_embedded,
        summary.pages_enhanced,
        output.display()
    ))
}

fn open_ledger(config: &LegibleConfig) -> Result<StateStore> {
    let store = StateStore::new(&config.state_file);
    store.load()?;
    Ok(store)
}

pub fn state_show(config: &LegibleConfig) -> Result<String> {
    let store = open_ledger(config)?;
    let mut out = String::new();
    let _ = writeln!(out, "Ledger:    {}", store.path().display());
    let _ = writeln!(out, "Documents: {}", store.count());
    let last = store
        .last_sync()
        .map_or_else(|| "never".to_owned(), |t| t.to_rfc3339());
    let _ = writeln!(out, "Last sync: {last}");
    for status in ALL_STATUSES {
        let n = store.by_status(status).len();
        if n > 0 {
            let _ = writeln!(out, "  {status}: {n}");
        }
    }
    let pending_ocr = store.needing_ocr().len();
    if pending_ocr > 0 {
        let _ = writeln!(out, "  awaiting OCR: {pending_ocr}");
    }
    Ok(out)
}

pub fn state_list(config: &LegibleConfig, status: Option<ConversionStatus>) -> Result<String> {
    let store = open_ledger(config)?;
    let records = match status {
        Some(status) => store.by_status(status),
        None => store.snapshot().documents.into_values().collect(),
    };

    let mut out = String::new();
    for record in records {
        let _ = write!(
            out,
            "{}  v{}  {:<11}  {}",
            record.id,
            record.version,
            record.conversion_status(),
            record.name
        );
        if let Some(error) = &record.error {
            let _ = write!(out, "  ({error})");
        }
        out.push('\n');
    }
    Ok(out)
}

pub fn state_reset(config: &LegibleConfig) -> Result<String> {
    let store = open_ledger(config)?;
    let forgotten = store.count();
    store.reset();
    store.save()?;
    Ok(format!("Forgot {forgotten} documents; the next sync rebuilds everything\n"))
}

pub fn check_config(config: &LegibleConfig) -> Result<String> {
    config.validate()?;
    let mut out = String::from("Configuration OK\n");
    let _ = writeln!(out, "  output:   {}", config.output_dir.display());
    let _ = writeln!(out, "  ledger:   {}", config.state_file.display());
    let _ = writeln!(out, "  interval: {}s", config.daemon.sync_interval.as_secs());
    if config.ocr_enabled {
        let _ = writeln!(
            out,
            "  ocr:      {} ({})",
            config.ocr.provider.as_str(),
            config.ocr.effective_model()
        );
    } else {
        let _ = writeln!(out, "  ocr:      disabled");
    }
    Ok(out)
}
