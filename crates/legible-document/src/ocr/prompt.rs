// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR prompt template — bundled at build time, overridable from a file.

use std::path::Path;

use legible_core::error::{LegibleError, Result};
use tracing::info;

/// Prompt compiled into the binary.
pub const DEFAULT_PROMPT: &str = include_str!("../../assets/ocr_prompt.txt");

/// Load the prompt once at startup: the override file when given, else the
/// bundled template.
pub fn load_prompt(override_path: Option<&Path>) -> Result<String> {
    let Some(path) = override_path else {
        return Ok(DEFAULT_PROMPT.to_owned());
    };
    let prompt = std::fs::read_to_string(path).map_err(|e| {
        LegibleError::Config(format!("cannot read OCR prompt {}: {e}", path.display()))
    })?;
    if prompt.trim().is_empty() {
        return Err(LegibleError::Config(format!(
            "OCR prompt {} is empty",
            path.display()
        )));
    }
    info!(path = %path.display(), "using custom OCR prompt");
    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_prompt_asks_for_json_words() {
        assert!(DEFAULT_PROMPT.contains("\"words\""));
        assert!(DEFAULT_PROMPT.contains("bbox"));
        assert_eq!(load_prompt(None).expect("default"), DEFAULT_PROMPT);
    }

    #[test]
    fn override_file_wins() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "Read the note.").expect("write");
        assert_eq!(load_prompt(Some(&path)).expect("override"), "Read the note.");
    }

    #[test]
    fn empty_override_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "  \n").expect("write");
        assert!(load_prompt(Some(&path)).is_err());
    }
}
