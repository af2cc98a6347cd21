// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Conversion seams — notebook-to-PDF conversion and page rasterisation.
//
// Rendering handwritten notebooks and rasterising PDF pages are both done by
// external tools. The pipeline only talks to them through these traits; the
// one converter implemented here handles documents that are already PDFs.

use std::path::Path;

use legible_core::error::{LegibleError, Result};
use tracing::{debug, instrument, warn};

use crate::pdf::PageSurface;
use crate::pdf::pages::PdfPages;

/// What a conversion produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionOutcome {
    pub page_count: usize,
    /// Non-fatal problems, e.g. unsupported pen types.
    pub warnings: Vec<String>,
    /// False when the source was copied through unchanged.
    pub converted: bool,
}

/// Turns a downloaded document into a PDF at `dest`.
pub trait Converter: Send + Sync {
    fn convert(&self, src: &Path, dest: &Path) -> Result<ConversionOutcome>;
}

/// Rasterises PDF pages for OCR.
pub trait PageRenderer: Send + Sync {
    /// One encoded image (PNG or JPEG) per page, in page order.
    fn render_pages(&self, pdf: &Path) -> Result<Vec<Vec<u8>>>;
}

/// Copies a PDF through and counts its pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfPassthroughConverter;

impl Converter for PdfPassthroughConverter {
    #[instrument(skip_all, fields(src = %src.display()))]
    fn convert(&self, src: &Path, dest: &Path) -> Result<ConversionOutcome> {
        let pages = PdfPages::open(src)
            .map_err(|e| LegibleError::Conversion(format!("source is not a readable PDF: {e}")))?;
        let page_count = pages.page_count();

        std::fs::copy(src, dest).map_err(|e| {
            LegibleError::Conversion(format!("cannot copy {} to {}: {e}", src.display(), dest.display()))
        })?;

        let mut warnings = Vec::new();
        if page_count == 0 {
            warn!("PDF has no pages");
            warnings.push("document has no pages".to_owned());
        }
        debug!(page_count, "PDF passed through");

        Ok(ConversionOutcome {
            page_count,
            warnings,
            converted: false,
        })
    }
}
