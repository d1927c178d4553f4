//! Rename proposals ranked by name similarity

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use super::distance::QGram;
use crate::utils::base_name;

/// A catalog name ranked against a file name
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<'a> {
    pub name: &'a str,
    pub distance: f64,
}

/// Returns the `max_count` catalog names closest to `base_name`.
///
/// A `max_count` of 0 is treated as 1. Equal distances keep catalog order.
pub fn suggest<'a>(
    base_name: &str,
    catalog: &'a [String],
    max_count: usize,
) -> Vec<Candidate<'a>> {
    let qgram = QGram::default();
    let mut candidates: Vec<Candidate<'a>> = catalog
        .iter()
        .map(|name| Candidate {
            name,
            distance: qgram.distance(base_name, name),
        })
        .collect();
    if candidates.len() <= 1 {
        return candidates;
    }
    candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    candidates.truncate(max_count.max(1));
    candidates
}

/// A proposed new name for an invalid file.
///
/// The target keeps the extension of the invalid file. Two suggestions are
/// the same only if they also point at the same invalid file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    #[serde(skip)]
    pub invalid_path: PathBuf,
    /// Proposed name without extension
    pub file_name: String,
    pub full_path: PathBuf,
    /// Whether `full_path` already existed when the suggestion was made
    pub file_exists: bool,
    pub distance: f64,
}

impl Suggestion {
    pub fn new(invalid_path: &Path, name: &str, distance: f64) -> Self {
        let mut file_name = name.to_string();
        if let Some(ext) = invalid_path.extension() {
            file_name.push('.');
            file_name.push_str(&ext.to_string_lossy());
        }
        let full_path = invalid_path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(file_name);
        Self {
            invalid_path: invalid_path.to_path_buf(),
            file_name: name.to_string(),
            file_exists: full_path.exists(),
            full_path,
            distance,
        }
    }

    /// Suggestions for `invalid_path` from the closest catalog names
    pub fn for_file(invalid_path: &Path, catalog: &[String], max_count: usize) -> Vec<Self> {
        suggest(&base_name(invalid_path), catalog, max_count)
            .into_iter()
            .map(|c| Self::new(invalid_path, c.name, c.distance))
            .collect()
    }

    /// True if renaming would not change the path
    pub fn is_noop(&self) -> bool {
        self.full_path == self.invalid_path
    }
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", base_name(&self.invalid_path), self.file_name)
    }
}
