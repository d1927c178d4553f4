//! Utility functions shared across modules.

use std::path::Path;

/// Returns true if `path` has one of `extensions`.
///
/// Entries may be written with or without the leading dot and are compared
/// case-insensitively. `"*"` or an empty list accepts every file.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use norcus_sheets_core::utils::has_extension;
///
/// let exts = vec![".pdf".to_string(), "png".to_string()];
/// assert!(has_extension(Path::new("Song.PDF"), &exts));
/// assert!(has_extension(Path::new("Song-001.png"), &exts));
/// assert!(!has_extension(Path::new("Song.txt"), &exts));
/// ```
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() || extensions.iter().any(|e| e == "*") {
        return true;
    }
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    extensions
        .iter()
        .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

/// Returns true if `path` looks like a source document (PDF)
pub fn is_source_document(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// File name without extension, lossily converted
pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// File name, lossily converted
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
