// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// legible-document — PDF text layers, conversion seams, and vision OCR.

pub mod convert;
pub mod ocr;
pub mod pdf;

pub use convert::{ConversionOutcome, Converter, PageRenderer, PdfPassthroughConverter};
pub use ocr::{OcrProcessor, VisionOcr, VisionTransport, load_prompt, new_vision_ocr};
pub use pdf::pages::PdfPages;
pub use pdf::text_layer::{EmbedSummary, TextLayerEmbedder};
pub use pdf::{PageSize, PageSurface};
