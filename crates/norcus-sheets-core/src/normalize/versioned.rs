//! Parsing of Google Drive duplicate markers ("Song (2).pdf")

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Marker directly in front of the extension: `" (2).pdf"`
fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<stem>.*?)\s\((?P<version>\d+)\)(?P<ext>\.[^.]+)$")
            .expect("version marker regex is valid")
    })
}

/// Returns true if the file name of `path` carries a duplicate marker
pub fn has_version_marker(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| version_regex().is_match(name))
}

/// A file name split into canonical name and duplicate version.
///
/// Files without a marker parse with version 0, so the canonical file sorts
/// below every marked sibling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedFile {
    pub path: PathBuf,
    /// Version number from the marker, 0 when absent
    pub version: u32,
    /// File name with the marker removed ("Song.pdf")
    pub canonical_name: String,
    /// Canonical name without extension ("Song")
    pub canonical_stem: String,
}

impl VersionedFile {
    pub fn parse(path: &Path) -> Self {
        let name = crate::utils::file_name(path);

        if let Some(caps) = version_regex().captures(&name) {
            let stem = caps["stem"].to_string();
            // Absurdly long counters are not something Drive produces
            let version = caps["version"].parse().unwrap_or(u32::MAX);
            return Self {
                path: path.to_path_buf(),
                version,
                canonical_name: format!("{}{}", stem, &caps["ext"]),
                canonical_stem: stem,
            };
        }

        Self {
            path: path.to_path_buf(),
            version: 0,
            canonical_stem: crate::utils::base_name(path),
            canonical_name: name,
        }
    }

    pub fn is_versioned(&self) -> bool {
        self.path
            .file_name()
            .is_some_and(|n| n.to_string_lossy() != self.canonical_name)
    }

    /// Directory the file lives in
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Full path with the marker removed
    pub fn canonical_path(&self) -> PathBuf {
        self.directory().join(&self.canonical_name)
    }

    /// True if `other` is the canonical file or another duplicate of it
    pub fn is_sibling(&self, other: &VersionedFile) -> bool {
        self.directory() == other.directory() && self.canonical_name == other.canonical_name
    }
}
