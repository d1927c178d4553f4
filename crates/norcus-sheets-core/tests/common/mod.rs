//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use norcus_sheets_core::{
    Config, ConversionPipeline, ImageNaming, RenderSettings, RenderedPage, Renderer, Result,
    WatchGate,
};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

pub const ARCHIVE: &str = "Archiv PDF";

/// Renderer reading the page count from the document itself: a test
/// document contains nothing but its number of pages.
#[derive(Default)]
pub struct FakeRenderer {
    pub renders: AtomicUsize,
    pub fail: AtomicBool,
    /// Renders that ran while this gate let events through
    pub renders_while_watching: AtomicUsize,
    gate: Mutex<Option<Arc<WatchGate>>>,
}

impl FakeRenderer {
    pub fn observe(&self, gate: Arc<WatchGate>) {
        *self.gate.lock().unwrap() = Some(gate);
    }

    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    fn pages(document: &Path) -> Result<usize> {
        let content = fs::read_to_string(document)?;
        Ok(content.trim().parse().unwrap_or(1))
    }
}

impl Renderer for FakeRenderer {
    fn render(&self, document: &Path, _settings: &RenderSettings) -> Result<Vec<RenderedPage>> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            if gate.is_enabled() {
                self.renders_while_watching.fetch_add(1, Ordering::SeqCst);
            }
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(norcus_sheets_core::Error::Render {
                path: document.to_path_buf(),
                message: "renderer unavailable".to_string(),
            });
        }
        let pages = Self::pages(document)?;
        Ok((0..pages)
            .map(|page| RenderedPage {
                data: format!("page {}", page + 1).into_bytes(),
            })
            .collect())
    }

    fn page_count(&self, document: &Path) -> Result<usize> {
        Self::pages(document)
    }
}

/// A temporary sheets library.
pub struct TestFixture {
    _temp_dir: TempDir,
    pub root: PathBuf,
    pub renderer: Arc<FakeRenderer>,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().join("sheets");
        fs::create_dir_all(&root).expect("Failed to create sheets dir");
        Self {
            _temp_dir: temp_dir,
            root,
            renderer: Arc::new(FakeRenderer::default()),
        }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Writes a document with `pages` pages
    pub fn document(&self, relative: &str, pages: usize) -> PathBuf {
        self.file(relative, &pages.to_string())
    }

    pub fn file(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().unwrap()).expect("Failed to create folder");
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    pub fn config(&self) -> Config {
        Config {
            sheets_path: Some(self.root.clone()),
            watched_extensions: vec![".pdf".to_string()],
            ..Config::default()
        }
    }

    /// Pipeline writing PNGs, archiving converted documents if `archive`
    pub fn pipeline(&self, archive: bool) -> Arc<ConversionPipeline> {
        let pipeline = ConversionPipeline::new(
            self.renderer.clone(),
            ImageNaming::default(),
            RenderSettings::default(),
        )
        .with_archive_subfolder(archive.then(|| ARCHIVE.to_string()));
        Arc::new(pipeline)
    }

    /// Sorted names of the PNG files directly inside `folder`
    pub fn images(&self, folder: &str) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.path(folder))
            .expect("Failed to read folder")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".png"))
            .collect();
        names.sort();
        names
    }
}

pub fn modified(path: &Path) -> SystemTime {
    fs::metadata(path).unwrap().modified().unwrap()
}

/// Moves the modification time of `path` by `offset` seconds
pub fn shift_modified(path: &Path, offset: i64) {
    let current = modified(path);
    let shifted = if offset >= 0 {
        current + Duration::from_secs(offset as u64)
    } else {
        current - Duration::from_secs(offset.unsigned_abs())
    };
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(shifted)
        .unwrap();
}
