//! Removing duplicate markers from file names

use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::versioned::{has_version_marker, VersionedFile};
use crate::utils::has_extension;

/// Outcome of a batch normalization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    /// Files carrying a duplicate marker that were looked at
    pub found: usize,
    /// Files renamed to their canonical name
    pub renamed: usize,
    /// Older duplicates removed
    pub deleted: usize,
    /// Renames or deletions that failed
    pub failed: usize,
}

impl NormalizeReport {
    fn merge(&mut self, other: NormalizeReport) {
        self.found += other.found;
        self.renamed += other.renamed;
        self.deleted += other.deleted;
        self.failed += other.failed;
    }
}

/// Normalizes every file with a duplicate marker under `root`.
///
/// With `allow_multiple_versions` set, groups that contain more than one
/// file are left alone. Failures are logged and never stop the batch.
pub fn normalize_all(
    root: &Path,
    recursive: bool,
    allow_multiple_versions: bool,
    extensions: &[String],
) -> NormalizeReport {
    let walker = if recursive {
        WalkDir::new(root)
    } else {
        WalkDir::new(root).max_depth(1)
    };

    let files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| has_extension(p, extensions) && has_version_marker(p))
        .collect();

    if !files.is_empty() {
        tracing::debug!(
            "Found {} files with a duplicate marker under {}",
            files.len(),
            root.display()
        );
    }

    let mut report = NormalizeReport::default();
    for file in files {
        // An earlier group may already have consumed this file
        if !file.exists() {
            continue;
        }
        let (_, file_report) = normalize_group(&file, allow_multiple_versions);
        report.merge(file_report);
    }
    report
}

/// Normalizes the group `path` belongs to and returns where the surviving
/// file ended up.
///
/// The path is returned unchanged when nothing was renamed.
pub fn normalize_file(path: &Path, allow_multiple_versions: bool) -> PathBuf {
    normalize_group(path, allow_multiple_versions).0
}

fn normalize_group(path: &Path, allow_multiple_versions: bool) -> (PathBuf, NormalizeReport) {
    let mut report = NormalizeReport {
        found: 1,
        ..Default::default()
    };
    let file = VersionedFile::parse(path);
    let mut versions = sibling_versions(&file);

    if versions.is_empty() || (versions.len() > 1 && allow_multiple_versions) {
        return (path.to_path_buf(), report);
    }

    versions.sort_by_key(|v| v.version);
    let Some(survivor) = versions.pop() else {
        return (path.to_path_buf(), report);
    };

    for older in &versions {
        match fs::remove_file(&older.path) {
            Ok(()) => {
                report.deleted += 1;
                tracing::debug!("File {} deleted", older.path.display());
            }
            Err(e) => {
                report.failed += 1;
                tracing::error!("File {} couldn't be deleted: {}", older.path.display(), e);
            }
        }
    }

    if !survivor.is_versioned() {
        return (survivor.path, report);
    }

    let target = survivor.canonical_path();
    match fs::rename(&survivor.path, &target) {
        Ok(()) => {
            report.renamed += 1;
            tracing::debug!(
                "File {} renamed to {}",
                survivor.path.display(),
                target.display()
            );
            (target, report)
        }
        Err(e) => {
            report.failed += 1;
            tracing::error!(
                "File {} couldn't be renamed to {}: {}",
                survivor.path.display(),
                target.display(),
                e
            );
            (path.to_path_buf(), report)
        }
    }
}

/// The canonical file plus every marked duplicate of it in the same folder
fn sibling_versions(file: &VersionedFile) -> Vec<VersionedFile> {
    let Ok(entries) = fs::read_dir(file.directory()) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| VersionedFile::parse(&e.path()))
        .filter(|v| v.is_sibling(file))
        .collect()
}
