// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Vision OCR — provider dispatch, prompt template, and word validation.

pub mod processor;
pub mod prompt;
pub mod provider;

pub use processor::OcrProcessor;
pub use prompt::{DEFAULT_PROMPT, load_prompt};
pub use provider::{
    ProviderClient, RawWord, VisionOcr, VisionRequest, VisionTransport, new_vision_ocr, parse_words,
};
