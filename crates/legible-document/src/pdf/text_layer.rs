// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text layer embedder — invisible, searchable OCR text over each page.
//
// OCR geometry is in image pixels with a top-left origin; PDF user space is in
// points with a bottom-left origin. Each word becomes one `Tj` in text render
// mode 3 (no fill, no stroke), sized and stretched to cover the ink it came
// from so selection highlights line up with the handwriting.

use std::fmt::Write as _;
use std::path::Path;

use legible_core::error::{LegibleError, Result};
use legible_core::{DocumentOcr, PageOcr};
use tracing::{debug, info, instrument};

use super::pages::PdfPages;
use super::{PageSize, PageSurface};

/// Resource name and base font of the single font the layer uses.
pub const TEXT_LAYER_FONT: &str = "Helvetica";

/// Fraction of the box height used as the font size.
const FONT_HEIGHT_RATIO: f64 = 0.9;
const MIN_FONT_SIZE: f64 = 1.0;
/// Rough Helvetica advance per character, as a fraction of the font size.
const GLYPH_WIDTH_RATIO: f64 = 0.5;
const MIN_HORIZONTAL_SCALE: f64 = 0.5;
const MAX_HORIZONTAL_SCALE: f64 = 2.0;

/// What an embedding pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbedSummary {
    pub pages_enhanced: usize,
    pub words_embedded: usize,
}

/// Adds invisible OCR text to page-description documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextLayerEmbedder;

impl TextLayerEmbedder {
    pub fn new() -> Self {
        Self
    }

    /// Embed `ocr` into `surface`, one page of OCR per document page.
    ///
    /// Fails when the page counts differ. Pages without a single non-blank
    /// word are left untouched.
    #[instrument(skip_all, fields(document_id = %ocr.document_id, pages = ocr.pages.len()))]
    pub fn add_text_layer<S: PageSurface>(&self, surface: &mut S, ocr: &DocumentOcr) -> Result<EmbedSummary> {
        if ocr.pages.len() != surface.page_count() {
            return Err(LegibleError::TextLayer(format!(
                "OCR page count ({}) does not match PDF page count ({})",
                ocr.pages.len(),
                surface.page_count()
            )));
        }

        let mut summary = EmbedSummary::default();
        for (index, page_ocr) in ocr.pages.iter().enumerate() {
            let page = index as u32 + 1;
            let words = page_ocr.visible_word_count();
            if words == 0 {
                debug!(page, "no OCR words, skipping page");
                continue;
            }

            let size = surface.page_dimensions(page)?;
            let fragment = page_fragment(page_ocr, size)
                .map_err(|e| LegibleError::TextLayer(format!("page {page}: {e}")))?;

            surface.ensure_standard_font(page, TEXT_LAYER_FONT, TEXT_LAYER_FONT)?;
            surface.append_contents(page, fragment)?;

            summary.pages_enhanced += 1;
            summary.words_embedded += words;
            debug!(page, words, "text layer added");
        }

        info!(
            pages_enhanced = summary.pages_enhanced,
            words = summary.words_embedded,
            "text layer embedded"
        );
        Ok(summary)
    }

    /// Read `input`, embed `ocr`, and write the result to `output`.
    #[instrument(skip_all, fields(input = %input.display(), output = %output.display()))]
    pub fn enhance_file(&self, input: &Path, output: &Path, ocr: &DocumentOcr) -> Result<EmbedSummary> {
        let mut pages = PdfPages::open(input)?;
        let summary = self.add_text_layer(&mut pages, ocr)?;
        pages.save(output)?;
        Ok(summary)
    }
}

/// Build the content-stream fragment for one page.
///
/// Returns an error only when the page has visible words but no usable pixel
/// dimensions to scale them from.
pub fn page_fragment(page: &PageOcr, size: PageSize) -> Result<Vec<u8>> {
    if page.width == 0 || page.height == 0 {
        return Err(LegibleError::TextLayer(format!(
            "page image has no pixel dimensions ({}x{})",
            page.width, page.height
        )));
    }

    let scale_x = size.width / f64::from(page.width);
    let scale_y = size.height / f64::from(page.height);

    let mut out = String::with_capacity(64 + page.words.len() * 64);
    out.push_str("q\nBT\n3 Tr\n");

    for word in page.words.iter().filter(|w| !w.is_blank()) {
        let bbox = word.bbox;
        let x = f64::from(bbox.x) * scale_x;
        let y = size.height - f64::from(bbox.y) * scale_y - f64::from(bbox.height) * scale_y;

        let font_size = (f64::from(bbox.height) * scale_y * FONT_HEIGHT_RATIO).max(MIN_FONT_SIZE);

        let estimated_width = word.text.chars().count() as f64 * font_size * GLYPH_WIDTH_RATIO;
        let box_width = f64::from(bbox.width) * scale_x;
        let horizontal_scale = if estimated_width > 0.0 {
            (box_width / estimated_width).clamp(MIN_HORIZONTAL_SCALE, MAX_HORIZONTAL_SCALE)
        } else {
            1.0
        };

        // Writing to a String cannot fail.
        let _ = write!(
            out,
            "/{TEXT_LAYER_FONT} {font_size:.2} Tf\n{horizontal_scale:.3} 0 0 1 {x:.2} {y:.2} Tm\n({}) Tj\n",
            escape_pdf_string(&word.text)
        );
    }

    out.push_str("ET\nQ\n");
    Ok(out.into_bytes())
}

/// Encode `text` as the body of a PDF literal string `( ... )` for a font
/// using WinAnsiEncoding.
///
/// Bytes outside printable ASCII are written as octal escapes, so the content
/// stream stays ASCII. Characters the encoding lacks become `?`.
pub fn escape_pdf_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ' '..='~' => out.push(ch),
            other => match win_ansi_byte(other) {
                Some(byte) => {
                    let _ = write!(out, "\\{byte:03o}");
                }
                None => out.push('?'),
            },
        }
    }
    out
}

/// WinAnsiEncoding code for a character outside printable ASCII.
fn win_ansi_byte(ch: char) -> Option<u8> {
    let code = u32::from(ch);
    if (0xA0..=0xFF).contains(&code) {
        return u8::try_from(code).ok();
    }
    let byte = match ch {
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        _ => return None,
    };
    Some(byte)
}
