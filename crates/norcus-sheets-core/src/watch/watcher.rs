//! File system watcher for the sheets library.
//!
//! Every immediate subfolder of the library root gets its own non-recursive
//! registration on a `notify::RecommendedWatcher`. Raw events are filtered
//! (watched extensions only, no temporary files), coalesced and debounced on
//! a background thread, then delivered as [`FileChangeEvent`]s.
//!
//! # Example
//!
//! ```rust,ignore
//! use norcus_sheets_core::watch::LibraryWatcher;
//!
//! let (mut watcher, rx) = LibraryWatcher::new(vec![".pdf".into()])?;
//! watcher.watch_library(Path::new("/path/to/sheets"))?;
//!
//! while let Ok(event) = rx.recv() {
//!     println!("{:?}", event);
//! }
//! ```

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use super::event::FileChangeEvent;
use crate::error::{Error, Result};
use crate::utils::has_extension;

/// Default debounce duration in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

/// How often the debounce thread checks for settled events.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// File extensions written by downloaders and editors while a file is
/// still incomplete.
const TEMP_EXTENSIONS: &[&str] = &[
    "tmp",
    "temp",
    "partial",
    "crdownload",
    "part",
    "download",
    "swp",
    "lock",
];

/// File name fragments of temporary or system files.
const TEMP_PATTERNS: &[&str] = &["~$", ".~", "thumbs.db", ".ds_store", "desktop.ini"];

/// Decides which paths produce events at all.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    extensions: Vec<String>,
}

impl EventFilter {
    /// Only files with one of `extensions` pass; empty accepts all.
    pub fn new(extensions: Vec<String>) -> Self {
        Self { extensions }
    }

    /// Returns true if the given path should be ignored.
    pub fn should_ignore(&self, path: &Path) -> bool {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return true;
        };
        let file_name_lower = file_name.to_lowercase();

        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if TEMP_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
                return true;
            }
        }
        if TEMP_PATTERNS.iter().any(|p| file_name_lower.contains(p)) {
            return true;
        }

        !has_extension(path, &self.extensions)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingKind {
    Created,
    Modified,
    Deleted,
}

/// Turns raw `notify` events into settled [`FileChangeEvent`]s.
///
/// Creations and modifications are held until the path has been quiet for
/// the debounce period, so a file still being written produces one event.
/// Renames are emitted immediately.
#[derive(Debug)]
pub struct EventCoalescer {
    filter: EventFilter,
    debounce: Duration,
    pending: HashMap<PathBuf, (PendingKind, Instant)>,
    rename_from: Option<(PathBuf, Instant)>,
}

impl EventCoalescer {
    pub fn new(filter: EventFilter, debounce: Duration) -> Self {
        Self {
            filter,
            debounce,
            pending: HashMap::new(),
            rename_from: None,
        }
    }

    /// Feeds one raw event; returns the events that are ready right away.
    pub fn push(&mut self, event: Event, now: Instant) -> Vec<FileChangeEvent> {
        let mut ready = Vec::new();
        match event.kind {
            EventKind::Create(_) => {
                for path in event.paths {
                    self.mark(path, PendingKind::Created, now);
                }
            }
            EventKind::Modify(ModifyKind::Name(mode)) => {
                let mut paths = event.paths.into_iter();
                match mode {
                    RenameMode::Both => {
                        if let (Some(from), Some(to)) = (paths.next(), paths.next()) {
                            self.rename(from, to, now, &mut ready);
                        }
                    }
                    RenameMode::From => {
                        if let Some(from) = paths.next() {
                            self.rename_from = Some((from, now));
                        }
                    }
                    RenameMode::To => {
                        if let Some(to) = paths.next() {
                            match self.rename_from.take() {
                                Some((from, _)) => self.rename(from, to, now, &mut ready),
                                None => self.mark(to, PendingKind::Created, now),
                            }
                        }
                    }
                    _ => {
                        // Platforms that do not say which half of a rename this is
                        for path in paths {
                            match self.rename_from.take() {
                                Some((from, _)) => self.rename(from, path, now, &mut ready),
                                None => self.rename_from = Some((path, now)),
                            }
                        }
                    }
                }
            }
            EventKind::Modify(_) => {
                for path in event.paths {
                    self.mark(path, PendingKind::Modified, now);
                }
            }
            EventKind::Remove(_) => {
                for path in event.paths {
                    self.mark(path, PendingKind::Deleted, now);
                }
            }
            _ => {}
        }
        ready
    }

    /// Returns the events that have been quiet long enough, or all of them
    /// when `flush_all` is set.
    pub fn flush(&mut self, now: Instant, flush_all: bool) -> Vec<FileChangeEvent> {
        let debounce = self.debounce;
        let mut settled = Vec::new();
        self.pending.retain(|path, (kind, timestamp)| {
            if flush_all || now.duration_since(*timestamp) >= debounce {
                settled.push((*timestamp, path.clone(), *kind));
                false
            } else {
                true
            }
        });

        // A rename source without a target was moved out of the folder
        let rename_expired = self
            .rename_from
            .as_ref()
            .is_some_and(|(_, t)| flush_all || now.duration_since(*t) >= debounce);
        if rename_expired {
            if let Some((from, timestamp)) = self.rename_from.take() {
                if !self.filter.should_ignore(&from) {
                    settled.push((timestamp, from, PendingKind::Deleted));
                }
            }
        }

        settled.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        settled
            .into_iter()
            .map(|(_, path, kind)| match kind {
                PendingKind::Created => FileChangeEvent::Created { path },
                PendingKind::Modified => FileChangeEvent::Modified { path },
                PendingKind::Deleted => FileChangeEvent::Deleted { path },
            })
            .collect()
    }

    fn mark(&mut self, path: PathBuf, kind: PendingKind, now: Instant) {
        if self.filter.should_ignore(&path) {
            return;
        }
        let previous = self.pending.get(&path).map(|(k, _)| *k);
        match (previous, kind) {
            // Created then removed before it settled: nothing happened
            (Some(PendingKind::Created), PendingKind::Deleted) => {
                self.pending.remove(&path);
            }
            // Keep reporting a creation while the writer is still busy
            (Some(PendingKind::Created), PendingKind::Modified) => {
                self.pending.insert(path, (PendingKind::Created, now));
            }
            _ => {
                self.pending.insert(path, (kind, now));
            }
        }
    }

    fn rename(
        &mut self,
        from: PathBuf,
        to: PathBuf,
        now: Instant,
        ready: &mut Vec<FileChangeEvent>,
    ) {
        let from_ignored = self.filter.should_ignore(&from);
        let to_ignored = self.filter.should_ignore(&to);
        let previous = self.pending.remove(&from).map(|(k, _)| k);

        if to_ignored {
            if !from_ignored && previous != Some(PendingKind::Created) {
                self.mark(from, PendingKind::Deleted, now);
            }
            return;
        }
        if from_ignored || previous == Some(PendingKind::Created) {
            // e.g. "Song.pdf.crdownload" -> "Song.pdf"
            self.mark(to, PendingKind::Created, now);
            return;
        }
        ready.push(FileChangeEvent::Renamed { from, to });
    }
}

/// Cross-platform file system watcher for the sheets library.
pub struct LibraryWatcher {
    /// The underlying notify watcher.
    watcher: RecommendedWatcher,
    /// List of currently watched folders.
    watched_paths: Vec<PathBuf>,
}

impl LibraryWatcher {
    /// Creates a watcher reporting files with one of `extensions`.
    ///
    /// Returns the watcher and a receiver for settled change events. The
    /// receiver disconnects once the watcher is dropped.
    pub fn new(extensions: Vec<String>) -> Result<(Self, Receiver<FileChangeEvent>)> {
        Self::with_debounce(extensions, DEFAULT_DEBOUNCE_MS)
    }

    /// Creates a new watcher with custom debounce duration.
    pub fn with_debounce(
        extensions: Vec<String>,
        debounce_ms: u64,
    ) -> Result<(Self, Receiver<FileChangeEvent>)> {
        let (event_tx, event_rx) = channel();
        let (internal_tx, internal_rx) = channel::<Event>();

        let watcher = RecommendedWatcher::new(
            move |result: std::result::Result<Event, notify::Error>| match result {
                Ok(event) => {
                    let _ = internal_tx.send(event);
                }
                Err(e) => tracing::error!("File watcher error: {}", e),
            },
            notify::Config::default(),
        )?;

        let coalescer = EventCoalescer::new(
            EventFilter::new(extensions),
            Duration::from_millis(debounce_ms),
        );
        std::thread::Builder::new()
            .name("sheets-watch-debounce".to_string())
            .spawn(move || debounce_loop(coalescer, internal_rx, event_tx))?;

        Ok((
            Self {
                watcher,
                watched_paths: Vec::new(),
            },
            event_rx,
        ))
    }

    /// Starts watching one folder, without its subfolders.
    pub fn watch_folder(&mut self, path: &Path) -> Result<()> {
        if !path.is_dir() {
            return Err(Error::Other(format!(
                "Path is not a directory: {}",
                path.display()
            )));
        }

        self.watcher.watch(path, RecursiveMode::NonRecursive)?;
        self.watched_paths.push(path.to_path_buf());
        tracing::debug!("Watching {}", path.display());
        Ok(())
    }

    /// Watches every immediate subfolder of `root`.
    ///
    /// Returns the number of folders registered. A folder that cannot be
    /// registered is logged and skipped.
    pub fn watch_library(&mut self, root: &Path) -> Result<usize> {
        let mut count = 0;
        for entry in fs::read_dir(root)?.filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_dir() || self.watched_paths.contains(&path) {
                continue;
            }
            match self.watch_folder(&path) {
                Ok(()) => count += 1,
                Err(e) => tracing::error!("Failed to watch {}: {}", path.display(), e),
            }
        }
        Ok(count)
    }

    /// Stops watching a folder.
    pub fn unwatch(&mut self, path: &Path) -> Result<()> {
        self.watcher.unwatch(path)?;
        self.watched_paths.retain(|p| p != path);
        Ok(())
    }

    /// Returns a slice of all currently watched folders.
    pub fn watched_paths(&self) -> &[PathBuf] {
        &self.watched_paths
    }
}

fn debounce_loop(
    mut coalescer: EventCoalescer,
    raw_rx: Receiver<Event>,
    event_tx: Sender<FileChangeEvent>,
) {
    loop {
        let received = raw_rx.recv_timeout(POLL_INTERVAL);
        let now = Instant::now();
        let (ready, disconnected) = match received {
            Ok(event) => (coalescer.push(event, now), false),
            Err(RecvTimeoutError::Timeout) => (Vec::new(), false),
            Err(RecvTimeoutError::Disconnected) => (Vec::new(), true),
        };

        for event in ready.into_iter().chain(coalescer.flush(now, disconnected)) {
            if event_tx.send(event).is_err() {
                return;
            }
        }
        if disconnected {
            break;
        }
    }
}
