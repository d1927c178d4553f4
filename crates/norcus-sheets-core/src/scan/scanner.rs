//! Whole-library scans

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

use crate::convert::{ConversionPipeline, SyncOutcome};
use crate::normalize::{normalize_all, NormalizeReport};
use crate::utils::is_source_document;
use crate::watch::WatchGate;

/// Kind of library scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Convert documents whose images are missing or stale
    Full,
    /// Full scan plus page-count verification, archived documents included
    Deep,
    /// Reconvert every document
    ForceConvert,
}

impl std::fmt::Display for ScanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "Full scan"),
            Self::Deep => write!(f, "Deep scan"),
            Self::ForceConvert => write!(f, "Force conversion"),
        }
    }
}

/// Result of one scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub mode: ScanMode,
    /// Source documents looked at
    pub documents: usize,
    /// Documents whose images were regenerated
    pub converted: usize,
    /// Documents that could not be converted
    pub failed: usize,
    /// Archived documents moved back next to their images
    pub restored: usize,
    pub normalized: NormalizeReport,
    pub duration: Duration,
}

impl ScanReport {
    fn new(mode: ScanMode) -> Self {
        Self {
            mode,
            documents: 0,
            converted: 0,
            failed: 0,
            restored: 0,
            normalized: NormalizeReport::default(),
            duration: Duration::ZERO,
        }
    }

    fn record(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Converted => self.converted += 1,
            SyncOutcome::Failed => self.failed += 1,
            SyncOutcome::UpToDate => {}
        }
    }
}

/// Clears the scan flag when the scan ends, however it ends
struct ScanClaim<'a>(&'a AtomicBool);

impl Drop for ScanClaim<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs full, deep and force scans over the library.
///
/// Only one scan runs at a time; a scan requested while another is running
/// is skipped and returns `None`. Watching is paused for the duration.
pub struct LibraryScanner {
    root: PathBuf,
    pipeline: Arc<ConversionPipeline>,
    gate: Arc<WatchGate>,
    scanning: AtomicBool,
    fix_gdrive_naming: bool,
    extensions: Vec<String>,
}

impl LibraryScanner {
    pub fn new(
        root: impl Into<PathBuf>,
        pipeline: Arc<ConversionPipeline>,
        gate: Arc<WatchGate>,
    ) -> Self {
        Self {
            root: root.into(),
            pipeline,
            gate,
            scanning: AtomicBool::new(false),
            fix_gdrive_naming: true,
            extensions: vec![".pdf".to_string()],
        }
    }

    /// Strip duplicate markers from files with `extensions` before scanning
    pub fn with_gdrive_fix(mut self, enabled: bool, extensions: Vec<String>) -> Self {
        self.fix_gdrive_naming = enabled;
        self.extensions = extensions;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    pub fn full_scan(&self) -> Option<ScanReport> {
        self.run(ScanMode::Full)
    }

    pub fn deep_scan(&self) -> Option<ScanReport> {
        self.run(ScanMode::Deep)
    }

    pub fn force_convert_all(&self) -> Option<ScanReport> {
        self.run(ScanMode::ForceConvert)
    }

    fn run(&self, mode: ScanMode) -> Option<ScanReport> {
        if self
            .scanning
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::info!("{} skipped, another scan is in progress", mode);
            return None;
        }
        let _claim = ScanClaim(&self.scanning);
        let _paused = self.gate.pause();

        let start = Instant::now();
        tracing::info!("{} of {} started", mode, self.root.display());
        let mut report = ScanReport::new(mode);

        if mode == ScanMode::ForceConvert {
            report.restored = self.restore_archived();
        }
        if self.fix_gdrive_naming {
            report.normalized = normalize_all(&self.root, true, false, &self.extensions);
        }

        let (live, archived) = self.documents();
        report.documents = live.len() + archived.len();
        tracing::debug!(
            "Found {} PDF files in {} ({} archived)",
            report.documents,
            self.root.display(),
            archived.len()
        );

        for doc in &live {
            let outcome = match mode {
                ScanMode::Full => self.pipeline.sync(doc, false),
                ScanMode::Deep => self.deep_sync(doc),
                ScanMode::ForceConvert => self.pipeline.sync(doc, true),
            };
            report.record(outcome);
        }

        if mode == ScanMode::Deep {
            for doc in &archived {
                let outcome = self.deep_sync_archived(doc, &mut report);
                report.record(outcome);
            }
        }

        report.duration = start.elapsed();
        tracing::info!(
            "{} finished in {:.2}s: {} of {} file(s) converted, {} failed",
            mode,
            report.duration.as_secs_f64(),
            report.converted,
            report.documents,
            report.failed
        );
        Some(report)
    }

    /// Source documents under the root, split into live and archived ones
    fn documents(&self) -> (Vec<PathBuf>, Vec<PathBuf>) {
        WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| is_source_document(p))
            .partition(|p| !self.pipeline.is_archived(p))
    }

    fn deep_sync(&self, doc: &Path) -> SyncOutcome {
        match self.pipeline.sync(doc, false) {
            SyncOutcome::UpToDate => {}
            outcome => return outcome,
        }
        match self.pipeline.check_page_count(doc) {
            Ok(check) if check.is_consistent() => SyncOutcome::UpToDate,
            Ok(check) => {
                tracing::debug!(
                    "File {} has {} page(s), but {} image(s)",
                    doc.display(),
                    check.pages,
                    check.images
                );
                self.pipeline.sync(doc, true)
            }
            Err(e) => {
                tracing::warn!("Unable to get page count of {}: {}", doc.display(), e);
                SyncOutcome::Failed
            }
        }
    }

    fn deep_sync_archived(&self, doc: &Path, report: &mut ScanReport) -> SyncOutcome {
        let check = match self.pipeline.check_page_count(doc) {
            Ok(check) => check,
            Err(e) => {
                tracing::warn!("Unable to get page count of {}: {}", doc.display(), e);
                return SyncOutcome::Failed;
            }
        };
        if check.is_consistent() {
            return SyncOutcome::UpToDate;
        }
        tracing::debug!(
            "Archived file {} has {} page(s), but {} image(s)",
            doc.display(),
            check.pages,
            check.images
        );
        match self.restore(doc) {
            Some(restored) => {
                report.restored += 1;
                self.pipeline.sync(&restored, true)
            }
            None => SyncOutcome::UpToDate,
        }
    }

    /// Moves every archived document back next to its images
    fn restore_archived(&self) -> usize {
        let (_, archived) = self.documents();
        archived.iter().filter_map(|doc| self.restore(doc)).count()
    }

    /// Moves one archived document back. A live document of the same name
    /// is newer and wins; the archived copy stays until it gets replaced.
    fn restore(&self, doc: &Path) -> Option<PathBuf> {
        let live = self.pipeline.images_dir(doc).join(doc.file_name()?);
        if live.exists() {
            tracing::debug!(
                "{} not restored, {} already exists",
                doc.display(),
                live.display()
            );
            return None;
        }
        match self.pipeline.restore_document(doc) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::error!("Failed to move {} back: {}", doc.display(), e);
                None
            }
        }
    }
}
