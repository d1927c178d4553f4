//! The running sheet manager

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use uuid::Uuid;

use crate::access::AccessPolicy;
use crate::catalog::{CatalogSource, FileCatalog};
use crate::config::Config;
use crate::convert::{ConversionPipeline, GhostscriptRenderer, Renderer};
use crate::correct::{
    CommitTarget, NameCorrector, Suggestion, TransactionResponse, TransactionView,
};
use crate::error::{Error, Result};
use crate::scan::{AutoScan, LibraryScanner, ScanReport};
use crate::watch::{EventDispatcher, LibraryWatcher, WatchGate};

/// Result of fixing every invalid name with its best suggestion
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FixReport {
    pub renamed: usize,
    /// Files without any suggestion
    pub skipped: usize,
    /// Failure messages, one per file
    pub failed: Vec<String>,
}

struct WatchSession {
    watcher: LibraryWatcher,
    dispatcher: JoinHandle<()>,
}

/// Owns every component of a running instance.
///
/// Built once at startup from a validated [`Config`]; the request layer and
/// the CLI only talk to this type.
pub struct SheetsManager {
    config: Config,
    root: PathBuf,
    gate: Arc<WatchGate>,
    pipeline: Arc<ConversionPipeline>,
    scanner: Arc<LibraryScanner>,
    corrector: NameCorrector,
    access: AccessPolicy,
    session: Mutex<Option<WatchSession>>,
    auto_scan: Mutex<Option<AutoScan>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SheetsManager {
    /// Builds a manager with the Ghostscript renderer and the file catalog
    pub fn from_config(config: Config) -> Result<Self> {
        let renderer = Arc::new(GhostscriptRenderer::new(&config.ghostscript_path));
        let catalog = Arc::new(FileCatalog::from_settings(&config.catalog));
        Self::new(config, renderer, catalog)
    }

    pub fn new(
        config: Config,
        renderer: Arc<dyn Renderer>,
        catalog: Arc<dyn CatalogSource>,
    ) -> Result<Self> {
        let root = config.validate()?.to_path_buf();
        let gate = Arc::new(WatchGate::new());
        let pipeline = Arc::new(ConversionPipeline::from_config(&config, renderer));
        let scanner = Arc::new(
            LibraryScanner::new(&root, pipeline.clone(), gate.clone())
                .with_gdrive_fix(config.fix_gdrive_naming, config.watched_extensions.clone()),
        );
        let corrector =
            NameCorrector::new(&root, catalog.clone(), config.watched_extensions.clone())
                .with_page_delimiter(config.multi_page_delimiter.clone());

        tracing::info!("Sheets folder: {}", root.display());
        Ok(Self {
            config,
            root,
            gate,
            pipeline,
            scanner,
            corrector,
            access: AccessPolicy::new(catalog),
            session: Mutex::new(None),
            auto_scan: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn gate(&self) -> &Arc<WatchGate> {
        &self.gate
    }

    pub fn pipeline(&self) -> &Arc<ConversionPipeline> {
        &self.pipeline
    }

    pub fn scanner(&self) -> &Arc<LibraryScanner> {
        &self.scanner
    }

    pub fn corrector(&self) -> &NameCorrector {
        &self.corrector
    }

    pub fn access(&self) -> &AccessPolicy {
        &self.access
    }

    /// Watches every library subfolder and dispatches events on a
    /// background thread. Returns the number of folders watched.
    pub fn start_watching(&self) -> Result<usize> {
        let mut session = lock(&self.session);
        if let Some(active) = session.as_ref() {
            return Ok(active.watcher.watched_paths().len());
        }

        let (mut watcher, rx) = LibraryWatcher::new(self.config.watched_extensions.clone())?;
        let folders = watcher.watch_library(&self.root)?;

        let dispatcher = EventDispatcher::new(self.pipeline.clone(), self.gate.clone())
            .with_gdrive_fix(self.config.fix_gdrive_naming);
        let handle = thread::Builder::new()
            .name("sheets-dispatch".to_string())
            .spawn(move || dispatcher.run(rx))?;

        self.gate.start();
        tracing::info!("File watchers started on {} folder(s)", folders);
        *session = Some(WatchSession {
            watcher,
            dispatcher: handle,
        });
        Ok(folders)
    }

    pub fn is_watching(&self) -> bool {
        lock(&self.session).is_some()
    }

    /// Stops watching; events still queued are dropped
    pub fn stop_watching(&self) {
        let Some(session) = lock(&self.session).take() else {
            return;
        };
        self.gate.stop();
        // Dropping the watcher closes the event stream
        drop(session.watcher);
        if session.dispatcher.join().is_err() {
            tracing::error!("Event dispatcher panicked");
        }
        tracing::info!("File watchers stopped");
    }

    /// Starts the periodic scan if enabled in the configuration
    pub fn start_auto_scan(&self) -> Result<bool> {
        if !self.config.auto_scan {
            return Ok(false);
        }
        let mut auto_scan = lock(&self.auto_scan);
        if auto_scan.is_none() {
            *auto_scan = Some(AutoScan::start(
                self.scanner.clone(),
                Duration::from_secs(self.config.auto_scan_interval_secs),
                self.config.auto_scan_repeats,
            )?);
        }
        Ok(true)
    }

    pub fn stop_auto_scan(&self) {
        if let Some(auto_scan) = lock(&self.auto_scan).take() {
            let scans = auto_scan.stop();
            tracing::debug!("Auto scan stopped after {} scan(s)", scans);
        }
    }

    /// Stops every background activity
    pub fn stop(&self) {
        self.stop_auto_scan();
        self.stop_watching();
    }

    pub fn full_scan(&self) -> Option<ScanReport> {
        self.scanner.full_scan()
    }

    pub fn deep_scan(&self) -> Option<ScanReport> {
        self.scanner.deep_scan()
    }

    pub fn force_convert_all(&self) -> Option<ScanReport> {
        self.scanner.force_convert_all()
    }

    /// Invalid names in `folder` (all folders for `None`) with up to
    /// `suggestions` suggestions each. `None` if the folder does not exist.
    ///
    /// An unreachable catalog is logged; every file is then listed.
    pub fn invalid_names(
        &self,
        folder: Option<&str>,
        suggestions: usize,
    ) -> Option<Vec<TransactionView>> {
        if let Err(e) = self.corrector.reload_data() {
            tracing::error!("{}", e);
        }
        match folder.filter(|f| !f.is_empty()) {
            Some(folder) => self.corrector.invalid_names(folder, suggestions),
            None => self.corrector.invalid_names_all(suggestions),
        }
    }

    pub fn count_invalid_names(&self, folder: Option<&str>) -> Option<usize> {
        self.corrector
            .count_invalid(folder.filter(|f| !f.is_empty()))
    }

    pub fn fix_name(&self, id: Uuid, suggestion_index: usize) -> TransactionResponse {
        self.corrector
            .commit(id, CommitTarget::Index(suggestion_index))
    }

    pub fn fix_name_as(&self, id: Uuid, file_name: &str) -> TransactionResponse {
        self.corrector
            .commit(id, CommitTarget::NewName(file_name.to_string()))
    }

    /// `None` if the transaction does not exist
    pub fn file_exists(&self, id: Uuid, file_name: &str) -> Option<Suggestion> {
        self.corrector.file_exists_check(id, file_name)
    }

    pub fn delete_invalid(&self, id: Uuid) -> TransactionResponse {
        self.corrector.delete(id)
    }

    /// Renames every invalid file to its closest catalog name.
    ///
    /// Refuses to run on an empty catalog. Files whose best match already
    /// exists are left alone. Watching is paused meanwhile.
    pub fn fix_all_names(&self) -> Result<FixReport> {
        self.corrector.reload_data()?;
        let views = self
            .corrector
            .invalid_names_all(1)
            .ok_or_else(|| Error::Config(format!("{} does not exist", self.root.display())))?;

        let _paused = self.gate.pause();
        let mut report = FixReport::default();
        for view in views {
            match view.suggestions.first() {
                Some(best) if !best.file_exists => {
                    let response = self.fix_name(view.id, 0);
                    if response.success {
                        report.renamed += 1;
                    } else {
                        report
                            .failed
                            .push(response.message.unwrap_or_else(|| best.to_string()));
                    }
                }
                _ => report.skipped += 1,
            }
        }
        tracing::info!(
            "Names fixed: {} renamed, {} skipped, {} failed",
            report.renamed,
            report.skipped,
            report.failed.len()
        );
        Ok(report)
    }
}

impl Drop for SheetsManager {
    fn drop(&mut self) {
        self.stop();
    }
}
