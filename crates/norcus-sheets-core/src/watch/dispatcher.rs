//! Reactions to library changes

use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::event::FileChangeEvent;
use super::gate::WatchGate;
use crate::convert::ConversionPipeline;
use crate::normalize::{has_version_marker, normalize_file};
use crate::utils::is_source_document;

/// What the dispatcher did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Watching was paused or stopped
    Dropped,
    /// Nothing to do for this event
    Ignored,
    /// The pipeline ran; `converted` tells whether images were regenerated
    Synced { converted: bool },
    /// Images followed a renamed document
    ImagesRenamed(usize),
}

/// Applies the library rules to change events:
///
/// - created: strip a duplicate marker first, then convert the document
/// - modified: convert the document if it is stale
/// - renamed: after marker removal the document is reconverted, otherwise its
///   images are renamed along with it
/// - deleted: nothing; orphaned images are replaced by the next conversion
///   reusing the name
///
/// Renames the dispatcher performs itself come back through the watcher
/// after the handler has returned. They are remembered and their echo is
/// dropped once.
pub struct EventDispatcher {
    pipeline: Arc<ConversionPipeline>,
    gate: Arc<WatchGate>,
    fix_gdrive_naming: bool,
    own_renames: Mutex<Vec<OwnRename>>,
}

/// Echoes older than this are assumed lost
const OWN_RENAME_TTL: Duration = Duration::from_secs(30);

struct OwnRename {
    from: PathBuf,
    to: PathBuf,
    at: Instant,
}

impl EventDispatcher {
    pub fn new(pipeline: Arc<ConversionPipeline>, gate: Arc<WatchGate>) -> Self {
        Self {
            pipeline,
            gate,
            fix_gdrive_naming: true,
            own_renames: Mutex::new(Vec::new()),
        }
    }

    /// Whether created files with a duplicate marker get renamed
    pub fn with_gdrive_fix(mut self, enabled: bool) -> Self {
        self.fix_gdrive_naming = enabled;
        self
    }

    pub fn dispatch(&self, event: &FileChangeEvent) -> DispatchOutcome {
        if !self.gate.is_enabled() {
            return DispatchOutcome::Dropped;
        }

        match event {
            FileChangeEvent::Created { path } => self.on_created(path),
            FileChangeEvent::Modified { path } => self.on_modified(path),
            FileChangeEvent::Renamed { from, to } => self.on_renamed(from, to),
            FileChangeEvent::Deleted { path } => {
                tracing::debug!("Detected: {} was deleted", path.display());
                DispatchOutcome::Ignored
            }
        }
    }

    /// Handles events until the watcher side of `rx` goes away
    pub fn run(&self, rx: Receiver<FileChangeEvent>) {
        for event in rx {
            self.dispatch(&event);
        }
        tracing::debug!("Watch event stream closed");
    }

    fn on_created(&self, path: &Path) -> DispatchOutcome {
        tracing::debug!("Detected: {} was created", path.display());

        let path = if self.fix_gdrive_naming && has_version_marker(path) {
            let normalized = normalize_file(path, false);
            if normalized.as_path() != path {
                self.remember_rename(path, &normalized);
            }
            normalized
        } else {
            path.to_path_buf()
        };

        if !is_source_document(&path) {
            return DispatchOutcome::Ignored;
        }
        DispatchOutcome::Synced {
            converted: self.pipeline.sync_document(&path, false),
        }
    }

    fn on_modified(&self, path: &Path) -> DispatchOutcome {
        if !is_source_document(path) || !path.exists() {
            return DispatchOutcome::Ignored;
        }
        tracing::debug!("Detected: {} has changed", path.display());
        DispatchOutcome::Synced {
            converted: self.pipeline.sync_document(path, false),
        }
    }

    fn remember_rename(&self, from: &Path, to: &Path) {
        let mut renames = self
            .own_renames
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        renames.retain(|r| now.duration_since(r.at) < OWN_RENAME_TTL);
        renames.push(OwnRename {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            at: now,
        });
    }

    /// Forgets and reports a rename this dispatcher made itself
    fn take_own_rename(&self, from: &Path, to: &Path) -> bool {
        let mut renames = self
            .own_renames
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match renames.iter().position(|r| r.from == from && r.to == to) {
            Some(index) => {
                renames.remove(index);
                true
            }
            None => false,
        }
    }

    fn on_renamed(&self, from: &Path, to: &Path) -> DispatchOutcome {
        if self.take_own_rename(from, to) {
            tracing::debug!("Skipping own rename of {}", from.display());
            return DispatchOutcome::Ignored;
        }
        tracing::debug!(
            "Detected: {} was renamed to {}",
            from.display(),
            to.display()
        );

        if !is_source_document(to) {
            return DispatchOutcome::Ignored;
        }
        // A stripped duplicate marker means different content under the old name
        if has_version_marker(from) {
            return DispatchOutcome::Synced {
                converted: self.pipeline.sync_document(to, true),
            };
        }
        if !is_source_document(from) {
            return DispatchOutcome::Ignored;
        }
        DispatchOutcome::ImagesRenamed(self.pipeline.rename_images(from, to))
    }
}
