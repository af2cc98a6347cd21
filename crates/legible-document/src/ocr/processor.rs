// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR processor — turns provider words into validated per-page OCR results.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex, PoisonError};

use image::ImageReader;
use legible_core::error::{LegibleError, Result};
use legible_core::{BoundingBox, DocumentOcr, OcrWord, PageOcr};
use tracing::{debug, info, instrument, warn};

use super::provider::VisionOcr;

/// Confidence assigned when the model reports none.
pub const DEFAULT_CONFIDENCE: f64 = 80.0;

/// Runs a [`VisionOcr`] over page images.
pub struct OcrProcessor {
    vision: Arc<dyn VisionOcr>,
    /// Last known pixel size per page number, for images that will not decode.
    dimensions: Mutex<HashMap<u32, (u32, u32)>>,
}

impl OcrProcessor {
    pub fn new(vision: Arc<dyn VisionOcr>) -> Self {
        Self {
            vision,
            dimensions: Mutex::new(HashMap::new()),
        }
    }

    pub fn provider(&self) -> &'static str {
        self.vision.name()
    }

    /// OCR one page image. `page_number` is 1-indexed.
    #[instrument(skip_all, fields(page = page_number, provider = self.vision.name()))]
    pub fn process_image(&self, image: &[u8], page_number: u32) -> Result<PageOcr> {
        let (width, height) = self.page_pixels(image, page_number);
        let raw = self.vision.recognize(image)?;

        let mut page = PageOcr::new(page_number, width, height);
        for word in raw {
            let Some(bbox) = BoundingBox::from_slice(&word.bbox) else {
                warn!(text = %word.text, values = word.bbox.len(), "skipping word with malformed bbox");
                continue;
            };
            let confidence = if word.confidence > 0.0 {
                word.confidence * 100.0
            } else {
                DEFAULT_CONFIDENCE
            };
            page.words.push(OcrWord::new(word.text, bbox, confidence));
        }

        debug!(words = page.words.len(), width, height, "page recognised");
        Ok(page)
    }

    /// OCR every page of a document, in order. Any page failure fails the
    /// document.
    #[instrument(skip_all, fields(document_id = %document_id, pages = images.len()))]
    pub fn process_document(&self, document_id: &str, images: &[Vec<u8>]) -> Result<DocumentOcr> {
        let mut ocr = DocumentOcr::new(document_id);
        for (index, image) in images.iter().enumerate() {
            let page_number = index as u32 + 1;
            let page = self
                .process_image(image, page_number)
                .map_err(|e| LegibleError::Ocr(format!("page {page_number}: {e}")))?;
            ocr.pages.push(page);
        }
        info!(words = ocr.total_words(), "document OCR complete");
        Ok(ocr)
    }

    /// Pixel size from the image header, falling back to the cached size for
    /// the same page, then to zero.
    fn page_pixels(&self, image: &[u8], page_number: u32) -> (u32, u32) {
        let mut cache = self.dimensions.lock().unwrap_or_else(PoisonError::into_inner);
        match image_dimensions(image) {
            Ok(dims) => {
                cache.insert(page_number, dims);
                dims
            }
            Err(e) => {
                let cached = cache.get(&page_number).copied().unwrap_or((0, 0));
                warn!(error = %e, cached_width = cached.0, cached_height = cached.1, "cannot read image dimensions");
                cached
            }
        }
    }
}

fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|e| LegibleError::Ocr(format!("unreadable page image: {e}")))
}

#[cfg(test)]
mod tests {
    use image::{ImageFormat, RgbImage};

    use super::*;
    use crate::ocr::provider::RawWord;

    struct CannedVision(Vec<RawWord>);

    impl VisionOcr for CannedVision {
        fn recognize(&self, _page_image: &[u8]) -> Result<Vec<RawWord>> {
            Ok(self.0.clone())
        }
        fn name(&self) -> &'static str {
            "canned"
        }
        fn model(&self) -> &str {
            "test"
        }
    }

    struct FailingVision;

    impl VisionOcr for FailingVision {
        fn recognize(&self, _page_image: &[u8]) -> Result<Vec<RawWord>> {
            Err(LegibleError::Ocr("model offline".into()))
        }
        fn name(&self) -> &'static str {
            "failing"
        }
        fn model(&self) -> &str {
            "none"
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        RgbImage::new(width, height)
            .write_to(&mut out, ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    fn raw(text: &str, bbox: &[i32], confidence: f64) -> RawWord {
        RawWord {
            text: text.into(),
            bbox: bbox.to_vec(),
            confidence,
        }
    }

    #[test]
    fn words_are_validated_and_rescaled() {
        let vision = CannedVision(vec![
            raw("good", &[1, 2, 3, 4], 0.95),
            raw("short", &[1, 2, 3], 0.9),
            raw("unscored", &[5, 6, 7, 8], 0.0),
        ]);
        let processor = OcrProcessor::new(Arc::new(vision));
        let page = processor.process_image(&png(40, 30), 1).expect("process");

        assert_eq!((page.width, page.height), (40, 30));
        assert_eq!(page.words.len(), 2);
        assert_eq!(page.words[0].bbox, BoundingBox::new(1, 2, 3, 4));
        assert!((page.words[0].confidence - 95.0).abs() < 1e-9);
        assert!((page.words[1].confidence - DEFAULT_CONFIDENCE).abs() < 1e-9);
    }

    #[test]
    fn undecodable_image_uses_cached_dimensions() {
        let processor = OcrProcessor::new(Arc::new(CannedVision(Vec::new())));
        processor.process_image(&png(20, 10), 2).expect("first pass");

        let page = processor.process_image(b"not an image", 2).expect("second pass");
        assert_eq!((page.width, page.height), (20, 10));

        let unknown = processor.process_image(b"not an image", 3).expect("no cache");
        assert_eq!((unknown.width, unknown.height), (0, 0));
    }

    #[test]
    fn document_pages_are_numbered_in_order() {
        let vision = CannedVision(vec![raw("w", &[0, 0, 1, 1], 0.5)]);
        let processor = OcrProcessor::new(Arc::new(vision));
        let doc = processor
            .process_document("doc-1", &[png(8, 8), png(8, 8), png(8, 8)])
            .expect("document");

        assert_eq!(doc.document_id, "doc-1");
        let numbers: Vec<u32> = doc.pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(doc.total_words(), 3);
    }

    #[test]
    fn provider_failure_fails_the_document() {
        let processor = OcrProcessor::new(Arc::new(FailingVision));
        let err = processor
            .process_document("doc-1", &[png(8, 8)])
            .expect_err("provider down");
        assert!(err.to_string().contains("page 1"));
    }
}
