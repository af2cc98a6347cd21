// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sync orchestrator — list, diff against the ledger, and run each out-of-date
// document through download, convert, OCR, embed, and relocate.
//
// Documents are processed one at a time and the ledger is saved after each,
// so an interrupted run loses at most the document in flight. One document
// failing never stops the batch; only setup, authentication, and cancellation
// errors end a run early.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use legible_core::config::LegibleConfig;
use legible_core::error::{LegibleError, Result};
use legible_core::{DocumentKind, RemoteDocument};
use legible_document::{
    Converter, OcrProcessor, PageRenderer, PdfPassthroughConverter, TextLayerEmbedder,
};
use legible_security::{AuthTokenManager, hash_file};
use tracing::{Span, debug, error, info, info_span, warn};

use crate::context::SyncContext;
use crate::ledger::{ConversionStatus, DocumentRecord};
use crate::progress::{Stage, SyncObserver};
use crate::result::{DocumentFailure, DocumentSuccess, SyncResult};
use crate::sanitize::{sanitize_filename, sanitize_folder_path};
use crate::source::DocumentSource;
use crate::state::StateStore;

/// Rasteriser and recogniser for the OCR stage.
pub struct OcrStage {
    pub renderer: Arc<dyn PageRenderer>,
    pub processor: Arc<OcrProcessor>,
}

/// Everything the orchestrator delegates to.
pub struct Collaborators {
    pub source: Arc<dyn DocumentSource>,
    pub auth: Arc<AuthTokenManager>,
    pub state: Arc<StateStore>,
    /// Notebook-to-PDF conversion. PDFs are passed through instead.
    pub converter: Arc<dyn Converter>,
    /// Required when OCR is enabled.
    pub ocr: Option<OcrStage>,
}

/// What the pipeline produced for one document.
struct PipelineOutput {
    page_count: usize,
    output_path: PathBuf,
    hash: String,
    converted: bool,
    ocr_processed: bool,
}

pub struct Orchestrator {
    output_dir: PathBuf,
    labels: Vec<String>,
    source: Arc<dyn DocumentSource>,
    auth: Arc<AuthTokenManager>,
    state: Arc<StateStore>,
    converter: Arc<dyn Converter>,
    passthrough: PdfPassthroughConverter,
    ocr: Option<OcrStage>,
    embedder: TextLayerEmbedder,
    observer: Option<Arc<dyn SyncObserver>>,
    span: Span,
}

impl Orchestrator {
    /// Fails when the configuration asks for something the collaborators
    /// cannot provide.
    pub fn new(config: &LegibleConfig, parts: Collaborators) -> Result<Self> {
        if config.output_dir.as_os_str().is_empty() {
            return Err(LegibleError::Config("output directory is required".into()));
        }
        let ocr = match (config.ocr_enabled, parts.ocr) {
            (true, Some(stage)) => Some(stage),
            (true, None) => return Err(LegibleError::MissingDependency("OCR renderer and processor")),
            (false, stage) => {
                if stage.is_some() {
                    debug!("OCR disabled, OCR stage will not run");
                }
                None
            }
        };

        let span = info_span!("orchestrator", output_dir = %config.output_dir.display());
        Ok(Self {
            output_dir: config.output_dir.clone(),
            labels: config.labels.clone(),
            source: parts.source,
            auth: parts.auth,
            state: parts.state,
            converter: parts.converter,
            passthrough: PdfPassthroughConverter,
            ocr,
            embedder: TextLayerEmbedder::new(),
            observer: None,
            span,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn state(&self) -> &Arc<StateStore> {
        &self.state
    }

    /// Run one full reconciliation.
    pub fn sync(&self, ctx: &SyncContext) -> Result<SyncResult> {
        let _enter = self.span.enter();
        let started = Instant::now();
        let mut result = SyncResult::new(Utc::now());
        info!("starting sync");

        ctx.check()?;
        let token = self.auth.ensure_valid_token()?;
        let listed = self.source.list(&token, &self.labels)?;
        let listed_count = listed.len();
        let documents = filter_by_labels(dedupe(listed), &self.labels);
        info!(listed = listed_count, documents = documents.len(), "documents listed");

        if let Err(e) = self.state.load() {
            warn!(error = %e, "cannot load ledger, continuing with in-memory state");
        }

        let pending: Vec<&RemoteDocument> = documents.iter().filter(|d| self.needs_sync(d)).collect();
        info!(count = pending.len(), "documents to sync");
        result.total_documents = documents.len();
        result.processed_documents = pending.len();
        if let Some(observer) = &self.observer {
            observer.documents_planned(pending.len());
        }

        for (index, doc) in pending.iter().enumerate() {
            ctx.check()?;
            info!(document = index + 1, total = pending.len(), id = %doc.id, title = %doc.name, "processing document");

            let doc_started = Instant::now();
            let started_at = Utc::now();
            match self.process_document(doc, index) {
                Ok(output) => {
                    let duration = doc_started.elapsed();
                    info!(id = %doc.id, output = %output.output_path.display(), ?duration, "document synced");
                    self.record_success(doc, &output);
                    result.successes.push(DocumentSuccess {
                        document_id: doc.id.clone(),
                        title: doc.name.clone(),
                        page_count: output.page_count,
                        output_path: output.output_path,
                        started_at,
                        duration,
                    });
                }
                Err(e) if e.aborts_sync() => {
                    error!(id = %doc.id, error = %e, "sync aborted");
                    return Err(e);
                }
                Err(e) => {
                    warn!(id = %doc.id, error = %e, "document failed");
                    self.record_failure(doc, &e);
                    result.failures.push(DocumentFailure {
                        document_id: doc.id.clone(),
                        title: doc.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        self.state.touch_last_sync(Utc::now());
        self.persist();

        result.finished_at = Utc::now();
        result.duration = started.elapsed();
        info!(
            total = result.total_documents,
            processed = result.processed_documents,
            successful = result.success_count(),
            failed = result.failure_count(),
            duration = ?result.duration,
            "sync completed"
        );
        Ok(result)
    }

    fn needs_sync(&self, doc: &RemoteDocument) -> bool {
        match self.state.get(&doc.id) {
            Some(record) => record.needs_sync(doc.version, doc.modified_at),
            None => true,
        }
    }

    // -- Pipeline -------------------------------------------------------------

    fn process_document(&self, doc: &RemoteDocument, processed: usize) -> Result<PipelineOutput> {
        let workspace = tempfile::Builder::new().prefix("legible-").tempdir()?;
        let scratch = workspace.path();

        self.report(processed, doc, Stage::Download);
        let token = self.auth.ensure_valid_token()?;
        let archive = scratch.join(format!("source.{}", doc.kind.download_extension()));
        self.source.download(&token, &doc.id, &archive)?;

        self.report(processed, doc, Stage::Convert);
        let converted = scratch.join("converted.pdf");
        let converter: &dyn Converter = match doc.kind {
            DocumentKind::Pdf => &self.passthrough,
            _ => self.converter.as_ref(),
        };
        let outcome = converter.convert(&archive, &converted)?;
        for warning in &outcome.warnings {
            warn!(id = %doc.id, %warning, "conversion warning");
        }

        let (final_pdf, ocr_processed) = match &self.ocr {
            Some(stage) => self.recognise_and_embed(stage, doc, processed, &converted, scratch)?,
            None => (converted, false),
        };

        self.report(processed, doc, Stage::Relocate);
        let output_path = self.relocate(doc, &final_pdf)?;
        let hash = hash_file(&output_path)?;

        Ok(PipelineOutput {
            page_count: outcome.page_count,
            output_path,
            hash,
            converted: outcome.converted,
            ocr_processed,
        })
    }

    /// OCR every page and embed the text. A failed embed falls back to the
    /// converted PDF; a failed OCR fails the document.
    fn recognise_and_embed(
        &self,
        stage: &OcrStage,
        doc: &RemoteDocument,
        processed: usize,
        converted: &Path,
        scratch: &Path,
    ) -> Result<(PathBuf, bool)> {
        self.report(processed, doc, Stage::Ocr);
        let images = stage.renderer.render_pages(converted)?;
        let ocr = stage.processor.process_document(&doc.id, &images)?;
        if !ocr.has_content() {
            debug!(id = %doc.id, "OCR found no text");
            return Ok((converted.to_path_buf(), true));
        }

        self.report(processed, doc, Stage::Embed);
        let enhanced = scratch.join("enhanced.pdf");
        match self.embedder.enhance_file(converted, &enhanced, &ocr) {
            Ok(summary) => {
                debug!(id = %doc.id, pages = summary.pages_enhanced, words = summary.words_embedded, "text layer added");
                Ok((enhanced, true))
            }
            Err(e) => {
                warn!(id = %doc.id, error = %e, "text layer failed, keeping converted PDF");
                Ok((converted.to_path_buf(), false))
            }
        }
    }

    /// Copy the finished PDF into the output tree, mirroring the remote
    /// folder when it can be resolved. A name already claimed by another
    /// document gets the document id appended.
    fn relocate(&self, doc: &RemoteDocument, final_pdf: &Path) -> Result<PathBuf> {
        let token = self.auth.ensure_valid_token()?;
        let folder = match self.source.folder_path(&token, &doc.id) {
            Ok(path) => sanitize_folder_path(&path),
            Err(e) if e.aborts_sync() => return Err(e),
            Err(e) => {
                warn!(id = %doc.id, error = %e, "cannot resolve folder, saving to output root");
                PathBuf::new()
            }
        };

        let dir = self.output_dir.join(folder);
        std::fs::create_dir_all(&dir)?;
        let stem = output_stem(doc);
        let mut output_path = dir.join(format!("{stem}.pdf"));
        if let Some(owner) = self.state.path_owner(&output_path) {
            if owner != doc.id {
                debug!(id = %doc.id, %owner, path = %output_path.display(), "output name taken, adding document id");
                output_path = dir.join(format!("{stem} ({}).pdf", sanitize_filename(&doc.id)));
            }
        }
        std::fs::copy(final_pdf, &output_path)?;
        Ok(output_path)
    }

    // -- Bookkeeping ----------------------------------------------------------

    fn record_for(&self, doc: &RemoteDocument) -> DocumentRecord {
        let mut record = self
            .state
            .get(&doc.id)
            .unwrap_or_else(|| DocumentRecord::new(&doc.id, &doc.name, doc.kind, &doc.parent));
        record.name = doc.name.clone();
        record.kind = doc.kind;
        record.parent = doc.parent.clone();
        record.labels = doc.labels.clone();
        record
    }

    fn record_success(&self, doc: &RemoteDocument, output: &PipelineOutput) {
        let now = Utc::now();
        let mut record = self.record_for(doc);
        let status = if output.converted {
            ConversionStatus::Completed
        } else {
            ConversionStatus::Skipped
        };
        finish_conversion(&mut record, status);
        record.mark_synced(
            doc.version,
            doc.modified_at,
            output.output_path.clone(),
            output.hash.clone(),
            now,
        );
        if output.ocr_processed {
            record.mark_ocr_complete(now);
        }
        self.state.upsert(record);
        self.persist();
    }

    /// The stored version is left alone so the next run retries.
    fn record_failure(&self, doc: &RemoteDocument, err: &LegibleError) {
        let mut record = self.record_for(doc);
        finish_conversion(&mut record, ConversionStatus::Failed);
        record.mark_error(&err.to_string());
        self.state.upsert(record);
        self.persist();
    }

    fn persist(&self) {
        if let Err(e) = self.state.save() {
            warn!(error = %e, "failed to save ledger");
        }
    }

    fn report(&self, processed: usize, doc: &RemoteDocument, stage: Stage) {
        debug!(id = %doc.id, %stage, "stage");
        if let Some(observer) = &self.observer {
            observer.stage_entered(processed, &doc.name, stage);
        }
    }
}

fn finish_conversion(record: &mut DocumentRecord, outcome: ConversionStatus) {
    record.reset_conversion();
    for status in [ConversionStatus::InProgress, outcome] {
        if let Err(e) = record.set_conversion_status(status) {
            warn!(error = %e, "conversion status not updated");
        }
    }
}

/// Keep one entry per id; a later listing entry replaces an earlier one in
/// place.
fn dedupe(listed: Vec<RemoteDocument>) -> Vec<RemoteDocument> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(listed.len());
    let mut out: Vec<RemoteDocument> = Vec::with_capacity(listed.len());
    for doc in listed {
        match positions.get(&doc.id) {
            Some(&at) => {
                debug!(id = %doc.id, old = out[at].version, new = doc.version, "duplicate listing entry");
                out[at] = doc;
            }
            None => {
                positions.insert(doc.id.clone(), out.len());
                out.push(doc);
            }
        }
    }
    out
}

/// Folders are dropped. Label matching is done by the listing call; every
/// document it returns is accepted here.
fn filter_by_labels(documents: Vec<RemoteDocument>, labels: &[String]) -> Vec<RemoteDocument> {
    let documents: Vec<RemoteDocument> = documents
        .into_iter()
        .filter(|d| d.kind != DocumentKind::Collection)
        .collect();
    if !labels.is_empty() {
        debug!(labels = ?labels, count = documents.len(), "label filter applied upstream");
    }
    documents
}

fn output_stem(doc: &RemoteDocument) -> String {
    let name = sanitize_filename(doc.name.trim());
    if name.trim().is_empty() {
        sanitize_filename(&doc.id)
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;

    fn remote(id: &str, version: i64, kind: DocumentKind) -> RemoteDocument {
        RemoteDocument {
            id: id.into(),
            version,
            name: format!("Doc {id}"),
            modified_at: DateTime::from_timestamp(0, 0).expect("epoch"),
            kind,
            parent: String::new(),
            labels: Vec::new(),
        }
    }

    #[test]
    fn later_duplicate_wins_in_place() {
        let docs = dedupe(vec![
            remote("a", 1, DocumentKind::Notebook),
            remote("b", 1, DocumentKind::Notebook),
            remote("a", 3, DocumentKind::Notebook),
        ]);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "a");
        assert_eq!(docs[0].version, 3);
        assert_eq!(docs[1].id, "b");
    }

    #[test]
    fn folders_never_reach_the_pipeline() {
        let docs = filter_by_labels(
            vec![
                remote("folder", 1, DocumentKind::Collection),
                remote("notes", 1, DocumentKind::Notebook),
            ],
            &["work".to_string()],
        );
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "notes");
    }

    #[test]
    fn blank_names_fall_back_to_the_id() {
        let mut doc = remote("abc/123", 1, DocumentKind::Notebook);
        doc.name = "   ".into();
        assert_eq!(output_stem(&doc), "abc-123");
        doc.name = "Plans: Q3".into();
        assert_eq!(output_stem(&doc), "Plans- Q3");
    }

    #[test]
    fn finishing_resets_a_previous_cycle() {
        let mut record = DocumentRecord::new("a", "A", DocumentKind::Notebook, "");
        finish_conversion(&mut record, ConversionStatus::Completed);
        assert_eq!(record.conversion_status(), ConversionStatus::Completed);
        finish_conversion(&mut record, ConversionStatus::Failed);
        assert_eq!(record.conversion_status(), ConversionStatus::Failed);
    }
}
