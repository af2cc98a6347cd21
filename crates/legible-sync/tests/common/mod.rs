// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory collaborators shared by the sync integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use jsonwebtoken::{EncodingKey, Header};
use legible_core::config::LegibleConfig;
use legible_core::error::{LegibleError, Result};
use legible_core::{DocumentKind, RemoteDocument};
use legible_document::{ConversionOutcome, Converter};
use legible_security::{AuthTokenManager, CredentialStore, TokenExchanger};
use legible_sync::{
    Collaborators, ConversionStatus, DocumentRecord, DocumentSource, OcrStage, Orchestrator, StateStore,
};
use lopdf::{Dictionary, Document, Object, Stream, dictionary};
use tempfile::TempDir;

pub fn modified_at() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).expect("timestamp")
}

pub fn remote(id: &str, version: i64) -> RemoteDocument {
    RemoteDocument {
        id: id.into(),
        version,
        name: format!("Doc {id}"),
        modified_at: modified_at(),
        kind: DocumentKind::Notebook,
        parent: String::new(),
        labels: Vec::new(),
    }
}

/// A minimal PDF with `pages` US-letter pages.
pub fn pdf_bytes(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();
    for _ in 0..pages {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), b"0 0 m\n".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(pages as i64),
            "MediaBox" => Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ]),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).expect("serialise PDF");
    out
}

// ---------------------------------------------------------------------------
// Remote store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeSource {
    documents: Mutex<Vec<RemoteDocument>>,
    downloads: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    folders: Mutex<HashMap<String, String>>,
    reject_tokens: AtomicBool,
}

impl FakeSource {
    pub fn new(documents: Vec<RemoteDocument>) -> Self {
        Self {
            documents: Mutex::new(documents),
            ..Self::default()
        }
    }

    pub fn set_documents(&self, documents: Vec<RemoteDocument>) {
        *self.documents.lock().expect("lock") = documents;
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().expect("lock").clone()
    }

    pub fn fail_download(&self, id: &str) {
        self.failing.lock().expect("lock").insert(id.to_owned());
    }

    pub fn heal(&self, id: &str) {
        self.failing.lock().expect("lock").remove(id);
    }

    pub fn set_folder(&self, id: &str, path: &str) {
        self.folders.lock().expect("lock").insert(id.to_owned(), path.to_owned());
    }

    pub fn reject_tokens(&self) {
        self.reject_tokens.store(true, Ordering::SeqCst);
    }

    fn check_token(&self, token: &str) -> Result<()> {
        if token.is_empty() || self.reject_tokens.load(Ordering::SeqCst) {
            return Err(LegibleError::Auth("token rejected by remote store".into()));
        }
        Ok(())
    }
}

impl DocumentSource for FakeSource {
    fn list(&self, user_token: &str, _labels: &[String]) -> Result<Vec<RemoteDocument>> {
        self.check_token(user_token)?;
        Ok(self.documents.lock().expect("lock").clone())
    }

    fn download(&self, user_token: &str, id: &str, dest: &Path) -> Result<()> {
        self.check_token(user_token)?;
        self.downloads.lock().expect("lock").push(id.to_owned());
        if self.failing.lock().expect("lock").contains(id) {
            return Err(LegibleError::Download(format!("{id}: connection reset")));
        }
        let kind = self
            .documents
            .lock()
            .expect("lock")
            .iter()
            .find(|d| d.id == id)
            .map(|d| d.kind)
            .unwrap_or_default();
        let bytes = match kind {
            DocumentKind::Pdf => pdf_bytes(1),
            _ => b"PK\x03\x04 notebook archive".to_vec(),
        };
        std::fs::write(dest, bytes)?;
        Ok(())
    }

    fn folder_path(&self, user_token: &str, id: &str) -> Result<String> {
        self.check_token(user_token)?;
        Ok(self
            .folders
            .lock()
            .expect("lock")
            .get(id)
            .cloned()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Converter and token endpoint
// ---------------------------------------------------------------------------

/// Writes a PDF with a fixed page count for every notebook.
pub struct FakeConverter {
    pub pages: usize,
    pub calls: AtomicUsize,
}

impl FakeConverter {
    pub fn new(pages: usize) -> Self {
        Self {
            pages,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Converter for FakeConverter {
    fn convert(&self, _src: &Path, dest: &Path) -> Result<ConversionOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::write(dest, pdf_bytes(self.pages))?;
        Ok(ConversionOutcome {
            page_count: self.pages,
            warnings: Vec::new(),
            converted: true,
        })
    }
}

pub fn user_token() -> String {
    let exp = (Utc::now() + chrono::TimeDelta::hours(1)).timestamp();
    jsonwebtoken::encode(
        &Header::default(),
        &serde_json::json!({ "exp": exp }),
        &EncodingKey::from_secret(b"test-secret"),
    )
    .expect("encode token")
}

#[derive(Default)]
pub struct FakeExchanger {
    pub fail: bool,
}

impl TokenExchanger for FakeExchanger {
    fn register_device(&self, _code: &str) -> Result<String> {
        Ok("device-token-0001".into())
    }

    fn renew_user_token(&self, _device_token: &str) -> Result<String> {
        if self.fail {
            return Err(LegibleError::Remote("token endpoint returned 401".into()));
        }
        Ok(user_token())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub dir: TempDir,
    pub config: LegibleConfig,
    pub source: Arc<FakeSource>,
    pub converter: Arc<FakeConverter>,
    pub state: Arc<StateStore>,
    pub auth: Arc<AuthTokenManager>,
}

impl Harness {
    pub fn new(documents: Vec<RemoteDocument>) -> Self {
        Self::with_exchanger(documents, FakeExchanger::default())
    }

    pub fn with_exchanger(documents: Vec<RemoteDocument>, exchanger: FakeExchanger) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = LegibleConfig {
            output_dir: dir.path().join("out"),
            state_file: dir.path().join("state.json"),
            token_file: dir.path().join("token.json"),
            ocr_enabled: false,
            ..LegibleConfig::default()
        };
        let auth = AuthTokenManager::new(CredentialStore::new(&config.token_file), Arc::new(exchanger));
        auth.set_token("device-token-0001").expect("device token");

        Self {
            state: Arc::new(StateStore::new(&config.state_file)),
            source: Arc::new(FakeSource::new(documents)),
            converter: Arc::new(FakeConverter::new(2)),
            auth: Arc::new(auth),
            config,
            dir,
        }
    }

    pub fn collaborators(&self, ocr: Option<OcrStage>) -> Collaborators {
        Collaborators {
            source: self.source.clone(),
            auth: self.auth.clone(),
            state: self.state.clone(),
            converter: self.converter.clone(),
            ocr,
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(&self.config, self.collaborators(None)).expect("orchestrator")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.config.output_dir.clone()
    }

    /// Store `doc` as already synced at `version`, with its output file on disk.
    pub fn seed(&self, doc: &RemoteDocument, version: i64) -> DocumentRecord {
        std::fs::create_dir_all(self.output_dir()).expect("output dir");
        let output = self.output_dir().join(format!("{}.pdf", doc.name));
        std::fs::write(&output, b"%PDF-1.5 seeded").expect("seed output");

        let mut record = DocumentRecord::new(&doc.id, &doc.name, doc.kind, &doc.parent);
        record
            .set_conversion_status(ConversionStatus::Completed)
            .expect("status");
        let hash = legible_security::hash_file(&output).expect("hash seeded output");
        record.mark_synced(version, doc.modified_at, output, hash, Utc::now());
        self.state.upsert(record.clone());
        self.state.save().expect("save seeded ledger");
        record
    }
}
