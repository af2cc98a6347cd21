// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Filesystem-safe names for output files and mirrored folders.

use std::path::PathBuf;

/// Replace characters that are invalid or awkward in filenames.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '|' => '-',
            '*' | '?' | '<' | '>' => '_',
            '"' => '\'',
            other => other,
        })
        .collect()
}

/// Turn a remote folder path into a relative output directory.
///
/// Each component is trimmed and sanitised; components left empty or reduced
/// to `-`, `_`, `.` or `..` are dropped, so the result never escapes the
/// output root.
pub fn sanitize_folder_path(path: &str) -> PathBuf {
    path.split('/')
        .map(|part| sanitize_filename(part.trim()))
        .filter(|part| !matches!(part.as_str(), "" | "-" | "_" | "." | ".."))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_character_map() {
        assert_eq!(sanitize_filename(r#"a/b\c:d*e?f"g<h>i|j"#), "a-b-c-d_e_f'g_h_i-j");
        assert_eq!(sanitize_filename("Meeting notes 2026"), "Meeting notes 2026");
    }

    #[test]
    fn folder_components_are_cleaned() {
        assert_eq!(
            sanitize_folder_path(" Work / Projects:2026 /"),
            PathBuf::from("Work").join("Projects-2026")
        );
    }

    #[test]
    fn traversal_components_are_dropped() {
        assert_eq!(sanitize_folder_path("../../etc"), PathBuf::from("etc"));
        assert_eq!(sanitize_folder_path("./ ? /"), PathBuf::new());
    }
}
