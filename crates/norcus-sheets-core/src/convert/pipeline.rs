//! Keeping the derived images of one document up to date

use std::fs::{self, File, FileTimes};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use super::naming::ImageNaming;
use super::renderer::{RenderSettings, Renderer};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::utils::{base_name, file_name};

/// Pause before the single retry of a source still held open by its writer
pub const LOCK_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Result of comparing a document's page count with its images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCheck {
    pub pages: usize,
    pub images: usize,
}

impl PageCheck {
    pub fn is_consistent(&self) -> bool {
        self.pages == self.images
    }
}

/// What a sync attempt did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Converted,
    UpToDate,
    Failed,
}

/// Converts documents into page images and keeps the images fresh.
///
/// Images always live in the document's library folder. When an archive
/// subfolder is configured, a converted document is moved into it and its
/// images stay in the parent.
pub struct ConversionPipeline {
    renderer: Arc<dyn Renderer>,
    naming: ImageNaming,
    settings: RenderSettings,
    archive_subfolder: Option<String>,
}

impl ConversionPipeline {
    pub fn new(renderer: Arc<dyn Renderer>, naming: ImageNaming, settings: RenderSettings) -> Self {
        Self {
            renderer,
            naming,
            settings,
            archive_subfolder: None,
        }
    }

    pub fn from_config(config: &Config, renderer: Arc<dyn Renderer>) -> Self {
        Self::new(renderer, config.image_naming(), config.render_settings())
            .with_archive_subfolder(config.archive_subfolder().map(str::to_string))
    }

    /// Move converted documents into `name` inside their folder
    pub fn with_archive_subfolder(mut self, name: Option<String>) -> Self {
        self.archive_subfolder = name;
        self
    }

    pub fn renderer(&self) -> &dyn Renderer {
        self.renderer.as_ref()
    }

    pub fn naming(&self) -> &ImageNaming {
        &self.naming
    }

    pub fn archive_subfolder(&self) -> Option<&str> {
        self.archive_subfolder.as_deref()
    }

    /// True if `doc` sits inside an archive subfolder
    pub fn is_archived(&self, doc: &Path) -> bool {
        match (&self.archive_subfolder, doc.parent().and_then(|p| p.file_name())) {
            (Some(archive), Some(parent)) => parent.to_string_lossy() == archive.as_str(),
            _ => false,
        }
    }

    /// Folder holding the images of `doc`
    pub fn images_dir(&self, doc: &Path) -> PathBuf {
        let parent = doc.parent().unwrap_or_else(|| Path::new(""));
        if self.is_archived(doc) {
            parent.parent().unwrap_or(parent).to_path_buf()
        } else {
            parent.to_path_buf()
        }
    }

    /// Existing images derived from `doc`
    pub fn find_images(&self, doc: &Path) -> Result<Vec<PathBuf>> {
        self.naming.find_images(&self.images_dir(doc), &base_name(doc))
    }

    /// Regenerates the images of `doc` if they are missing, older than the
    /// document, or `force` is set.
    ///
    /// Returns true if a conversion happened. Errors are logged and reported
    /// as "not converted"; the next scan or event retries.
    pub fn sync_document(&self, doc: &Path, force: bool) -> bool {
        self.sync(doc, force) == SyncOutcome::Converted
    }

    /// Like [`sync_document`](Self::sync_document), but tells a failed
    /// conversion apart from one that was not needed
    pub fn sync(&self, doc: &Path, force: bool) -> SyncOutcome {
        match self.try_sync_document(doc, force) {
            Ok(true) => SyncOutcome::Converted,
            Ok(false) => SyncOutcome::UpToDate,
            Err(Error::Io(e)) => {
                tracing::warn!("Conversion of {} skipped: {}", doc.display(), e);
                SyncOutcome::Failed
            }
            Err(e) => {
                tracing::error!("Conversion of {} failed: {}", doc.display(), e);
                SyncOutcome::Failed
            }
        }
    }

    fn try_sync_document(&self, doc: &Path, force: bool) -> Result<bool> {
        if !doc.is_file() {
            return Ok(false);
        }
        let doc_meta = fs::metadata(doc)?;
        let doc_modified = doc_meta.modified()?;
        let images = self.find_images(doc)?;

        let images_are_older = images.iter().any(|image| {
            fs::metadata(image)
                .and_then(|m| m.modified())
                .map(|modified| modified < doc_modified)
                .unwrap_or(true)
        });

        if !(force || images_are_older || images.is_empty()) {
            return Ok(false);
        }

        wait_until_readable(doc)?;
        let pages = self.renderer.render(doc, &self.settings)?;
        if pages.is_empty() {
            return Err(Error::Render {
                path: doc.to_path_buf(),
                message: "renderer produced no pages".to_string(),
            });
        }

        for image in &images {
            fs::remove_file(image)?;
            tracing::debug!(
                "Image {} was deleted{}",
                image.display(),
                if images_are_older {
                    " (found newer PDF)"
                } else {
                    ""
                }
            );
        }

        let accessed = doc_meta.accessed().unwrap_or(doc_modified);
        let times = FileTimes::new()
            .set_accessed(accessed)
            .set_modified(doc_modified);
        let dir = self.images_dir(doc);
        let base = base_name(doc);
        for (index, page) in pages.iter().enumerate() {
            let path = dir.join(self.naming.image_name(&base, index, pages.len()));
            fs::write(&path, &page.data)?;
            File::options().write(true).open(&path)?.set_times(times)?;
        }
        tracing::info!(
            "{} was converted into {} {} image(s)",
            doc.display(),
            pages.len(),
            self.settings.format
        );

        if !self.is_archived(doc) {
            self.archive_document(doc)?;
        }
        Ok(true)
    }

    /// Compares the page count of `doc` with the number of its images
    pub fn check_page_count(&self, doc: &Path) -> Result<PageCheck> {
        let pages = self.renderer.page_count(doc)?;
        let images = self.find_images(doc)?.len();
        Ok(PageCheck { pages, images })
    }

    /// Moves `doc` into the archive subfolder, replacing any file there.
    ///
    /// Returns the new location, or the old one when archiving is disabled.
    pub fn archive_document(&self, doc: &Path) -> Result<PathBuf> {
        let Some(archive) = &self.archive_subfolder else {
            return Ok(doc.to_path_buf());
        };
        let dir = self.images_dir(doc).join(archive);
        fs::create_dir_all(&dir)?;
        let target = dir.join(file_name(doc));
        fs::rename(doc, &target)?;
        tracing::debug!("{} moved to {}", doc.display(), target.display());
        Ok(target)
    }

    /// Moves an archived `doc` back next to its images, replacing any file
    /// there. Documents outside the archive are returned unchanged.
    pub fn restore_document(&self, doc: &Path) -> Result<PathBuf> {
        if !self.is_archived(doc) {
            return Ok(doc.to_path_buf());
        }
        let target = self.images_dir(doc).join(file_name(doc));
        fs::rename(doc, &target)?;
        tracing::debug!("{} moved back to {}", doc.display(), target.display());
        Ok(target)
    }

    /// Renames the images of a document renamed from `old_doc` to `new_doc`.
    ///
    /// Returns the number of images renamed; failures are logged.
    pub fn rename_images(&self, old_doc: &Path, new_doc: &Path) -> usize {
        let old_base = base_name(old_doc);
        let new_base = base_name(new_doc);
        if old_base == new_base {
            return 0;
        }
        let images = match self.find_images(old_doc) {
            Ok(images) => images,
            Err(e) => {
                tracing::error!("Failed to list images of {}: {}", old_doc.display(), e);
                return 0;
            }
        };

        let mut renamed = 0;
        for image in images {
            let new_name =
                ImageNaming::renamed_image_name(&file_name(&image), &old_base, &new_base);
            let target = image.with_file_name(new_name);
            match fs::rename(&image, &target) {
                Ok(()) => {
                    renamed += 1;
                    tracing::debug!("Image {} renamed to {}", image.display(), target.display());
                }
                Err(e) => tracing::error!(
                    "Image {} couldn't be renamed to {}: {}",
                    image.display(),
                    target.display(),
                    e
                ),
            }
        }
        renamed
    }
}

/// Opens `path` once more after [`LOCK_RETRY_DELAY`] if the first attempt
/// fails, e.g. while a sync client is still writing it.
fn wait_until_readable(path: &Path) -> Result<()> {
    if let Err(e) = File::open(path) {
        tracing::warn!(
            "{} is not readable ({}), retrying in {:?}",
            path.display(),
            e,
            LOCK_RETRY_DELAY
        );
        thread::sleep(LOCK_RETRY_DELAY);
        File::open(path)?;
    }
    Ok(())
}

/// Modification time of `path`, if available
pub fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::RenderedPage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FixedRenderer {
        pages: usize,
        renders: AtomicUsize,
    }

    impl Renderer for FixedRenderer {
        fn render(&self, _: &Path, _: &RenderSettings) -> Result<Vec<RenderedPage>> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            Ok((0..self.pages)
                .map(|i| RenderedPage {
                    data: vec![i as u8],
                })
                .collect())
        }

        fn page_count(&self, _: &Path) -> Result<usize> {
            Ok(self.pages)
        }
    }

    fn pipeline(pages: usize) -> (ConversionPipeline, Arc<FixedRenderer>) {
        let renderer = Arc::new(FixedRenderer {
            pages,
            renders: AtomicUsize::new(0),
        });
        let pipeline = ConversionPipeline::new(
            renderer.clone(),
            ImageNaming::default(),
            RenderSettings::default(),
        );
        (pipeline, renderer)
    }

    #[test]
    fn test_is_archived_and_images_dir() {
        let (pipeline, _) = pipeline(1);
        let pipeline = pipeline.with_archive_subfolder(Some("Archiv PDF".to_string()));

        let archived = Path::new("/s/A/Archiv PDF/Song.pdf");
        assert!(pipeline.is_archived(archived));
        assert_eq!(pipeline.images_dir(archived), PathBuf::from("/s/A"));

        let live = Path::new("/s/A/Song.pdf");
        assert!(!pipeline.is_archived(live));
        assert_eq!(pipeline.images_dir(live), PathBuf::from("/s/A"));
    }

    #[test]
    fn test_missing_document_is_not_converted() {
        let dir = TempDir::new().unwrap();
        let (pipeline, renderer) = pipeline(1);
        assert!(!pipeline.sync_document(&dir.path().join("None.pdf"), true));
        assert_eq!(renderer.renders.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_images_copy_document_times() {
        let dir = TempDir::new().unwrap();
        let doc = dir.path().join("Song.pdf");
        fs::write(&doc, b"%PDF").unwrap();
        let (pipeline, _) = pipeline(2);

        assert!(pipeline.sync_document(&doc, false));
        let doc_time = modified_time(&doc).unwrap();
        for image in pipeline.find_images(&doc).unwrap() {
            assert_eq!(modified_time(&image).unwrap(), doc_time);
        }
    }

    #[test]
    fn test_rename_images() {
        let dir = TempDir::new().unwrap();
        for name in ["Old-001.png", "Old-002.png", "Keep.png"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let (pipeline, _) = pipeline(2);

        let renamed =
            pipeline.rename_images(&dir.path().join("Old.pdf"), &dir.path().join("New.pdf"));
        assert_eq!(renamed, 2);
        assert!(dir.path().join("New-001.png").exists());
        assert!(dir.path().join("New-002.png").exists());
        assert!(dir.path().join("Keep.png").exists());
        assert!(!dir.path().join("Old-001.png").exists());
    }
}
