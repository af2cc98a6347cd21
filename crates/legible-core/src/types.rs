// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types shared by the sync, document, and daemon crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a remote entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DocumentKind {
    /// A handwritten notebook that needs converting.
    #[default]
    #[serde(rename = "DocumentType")]
    Notebook,
    /// A PDF uploaded to the remote store; only annotations need merging.
    #[serde(rename = "PdfType")]
    Pdf,
    /// A folder. Never synced itself, only used to build output paths.
    #[serde(rename = "CollectionType")]
    Collection,
}

impl DocumentKind {
    /// File extension used for the downloaded archive in the scratch workspace.
    pub fn download_extension(&self) -> &'static str {
        match self {
            Self::Notebook | Self::Collection => "rmdoc",
            Self::Pdf => "pdf",
        }
    }
}

/// One entry returned by the remote document listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub id: String,
    /// Monotonic per-document version number.
    pub version: i64,
    /// User-visible name.
    pub name: String,
    /// Client-side modification timestamp.
    pub modified_at: DateTime<Utc>,
    pub kind: DocumentKind,
    /// Parent folder id; empty for the root.
    #[serde(default)]
    pub parent: String,
    /// Labels attached to the document, when the listing exposes them.
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Pixel-space bounding box with a top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from the `[x, y, w, h]` array vision providers emit.
    ///
    /// Returns `None` when fewer than four values are present.
    pub fn from_slice(values: &[i32]) -> Option<Self> {
        match values {
            [x, y, w, h, ..] => Some(Self::new(*x, *y, *w, *h)),
            _ => None,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }
}

/// A recognised word with its position on the page image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrWord {
    pub text: String,
    pub bbox: BoundingBox,
    /// Recognition confidence on a 0-100 scale.
    pub confidence: f64,
}

impl OcrWord {
    pub fn new(text: impl Into<String>, bbox: BoundingBox, confidence: f64) -> Self {
        Self {
            text: text.into(),
            bbox,
            confidence,
        }
    }

    /// Whether this word carries any visible characters.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// OCR output for a single page image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageOcr {
    /// 1-indexed page number.
    pub page_number: u32,
    /// Page image width in pixels.
    pub width: u32,
    /// Page image height in pixels.
    pub height: u32,
    pub words: Vec<OcrWord>,
}

impl PageOcr {
    pub fn new(page_number: u32, width: u32, height: u32) -> Self {
        Self {
            page_number,
            width,
            height,
            words: Vec::new(),
        }
    }

    /// Space-joined text of every word on the page.
    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Mean word confidence, 0 when the page has no words.
    pub fn confidence(&self) -> f64 {
        if self.words.is_empty() {
            return 0.0;
        }
        self.words.iter().map(|w| w.confidence).sum::<f64>() / self.words.len() as f64
    }

    /// Count of words that would actually be embedded.
    pub fn visible_word_count(&self) -> usize {
        self.words.iter().filter(|w| !w.is_blank()).count()
    }
}

/// OCR output for every page of a document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentOcr {
    pub document_id: String,
    pub pages: Vec<PageOcr>,
}

impl DocumentOcr {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            pages: Vec::new(),
        }
    }

    pub fn total_words(&self) -> usize {
        self.pages.iter().map(|p| p.words.len()).sum()
    }

    /// True when at least one page has a non-blank word.
    pub fn has_content(&self) -> bool {
        self.pages.iter().any(|p| p.visible_word_count() > 0)
    }
}
