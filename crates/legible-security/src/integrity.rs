// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output integrity — SHA-256 fingerprints of synced documents.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use legible_core::error::{LegibleError, Result};
use sha2::{Digest, Sha256};

const READ_CHUNK: usize = 64 * 1024;

/// Compute the SHA-256 hash of `data` and return it as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Stream a file through SHA-256 and return the lowercase hex digest.
///
/// The ledger stores this next to each output path so a later run can tell a
/// replaced file from the one it wrote.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Check that the file at `path` still has the expected SHA-256 hex digest.
pub fn verify_file(path: &Path, expected_hex: &str) -> Result<()> {
    let actual = hash_file(path)?;
    if actual.eq_ignore_ascii_case(expected_hex) {
        Ok(())
    } else {
        Err(LegibleError::IntegrityMismatch {
            expected: expected_hex.to_owned(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn hash_empty_input() {
        assert_eq!(hash_bytes(b""), EMPTY_SHA256);
    }

    #[test]
    fn file_hash_matches_byte_hash() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("note.pdf");
        std::fs::write(&path, b"hello").expect("write");
        assert_eq!(hash_file(&path).expect("hash"), HELLO_SHA256);
    }

    #[test]
    fn large_file_hash_spans_chunks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("big.bin");
        let data = vec![0xA5u8; READ_CHUNK * 3 + 17];
        std::fs::write(&path, &data).expect("write");
        assert_eq!(hash_file(&path).expect("hash"), hash_bytes(&data));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = hash_file(Path::new("/nonexistent/legible.pdf")).expect_err("missing");
        assert!(matches!(err, LegibleError::Io(_)));
    }

    #[test]
    fn verify_file_detects_replaced_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("note.pdf");
        std::fs::write(&path, b"hello").expect("write");
        verify_file(&path, HELLO_SHA256).expect("matching hash");
        verify_file(&path, &HELLO_SHA256.to_uppercase()).expect("case-insensitive");

        std::fs::write(&path, b"a").expect("overwrite");
        match verify_file(&path, HELLO_SHA256) {
            Err(LegibleError::IntegrityMismatch { expected, actual }) => {
                assert_eq!(expected, HELLO_SHA256);
                assert_eq!(actual, hash_bytes(b"a"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
