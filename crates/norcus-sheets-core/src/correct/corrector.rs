//! Finding files whose names are not in the song catalog

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use super::registry::TransactionRegistry;
use super::suggestion::Suggestion;
use super::transaction::{
    CommitTarget, Transaction, TransactionResponse, TransactionView, MAX_SUGGESTIONS,
};
use crate::catalog::CatalogSource;
use crate::error::{Error, Result};
use crate::utils::{base_name, has_extension, is_source_document};

/// Catalog snapshot: ordered for ranking, hashed for lookups
#[derive(Default)]
struct Songs {
    list: Vec<String>,
    names: HashSet<String>,
}

/// Matches library file names against the catalog and hands out rename
/// transactions for the ones that do not match.
///
/// Only the top level of each user folder is checked, and only files with
/// one of the configured extensions. A name is valid if it equals a catalog
/// entry exactly, extension aside.
pub struct NameCorrector {
    root: PathBuf,
    catalog: Arc<dyn CatalogSource>,
    extensions: Vec<String>,
    page_delimiter: Option<String>,
    songs: RwLock<Songs>,
    registry: TransactionRegistry,
}

impl NameCorrector {
    pub fn new(
        root: impl Into<PathBuf>,
        catalog: Arc<dyn CatalogSource>,
        extensions: Vec<String>,
    ) -> Self {
        let corrector = Self {
            root: root.into(),
            catalog,
            extensions,
            page_delimiter: None,
            songs: RwLock::new(Songs::default()),
            registry: TransactionRegistry::new(),
        };
        let count = corrector.store_songs();
        if count == 0 {
            tracing::warn!("No song was loaded from the catalog");
        } else {
            tracing::debug!("Catalog connected, {} song(s)", count);
        }
        corrector
    }

    /// Accept page images named `<catalog name><delimiter><counter>`
    pub fn with_page_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.page_delimiter = Some(delimiter.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry(&self) -> &TransactionRegistry {
        &self.registry
    }

    /// Reloads the catalog and returns the number of songs.
    ///
    /// Fails with [`Error::CatalogEmpty`] when nothing was loaded; the
    /// corrector then treats every file as invalid.
    pub fn reload_data(&self) -> Result<usize> {
        if let Err(e) = self.catalog.reload() {
            tracing::debug!("Catalog reload failed: {}", e);
        }
        match self.store_songs() {
            0 => {
                tracing::warn!("No song was loaded from the catalog");
                Err(Error::CatalogEmpty)
            }
            count => Ok(count),
        }
    }

    fn store_songs(&self) -> usize {
        let list = self.catalog.song_names();
        let count = list.len();
        if let Ok(mut songs) = self.songs.write() {
            songs.names = list.iter().cloned().collect();
            songs.list = list;
        }
        count
    }

    /// True if `name` (without extension) is a catalog entry
    pub fn is_valid_name(&self, name: &str) -> bool {
        self.songs
            .read()
            .map(|s| s.names.contains(name))
            .unwrap_or(false)
    }

    /// True if the file at `path` is named after a catalog entry, directly
    /// or as one page image of it
    pub fn is_valid_file(&self, path: &Path) -> bool {
        let name = base_name(path);
        if self.is_valid_name(&name) {
            return true;
        }
        if is_source_document(path) {
            return false;
        }
        self.page_delimiter
            .as_deref()
            .and_then(|delimiter| strip_page_counter(&name, delimiter))
            .is_some_and(|base| self.is_valid_name(base))
    }

    /// Transactions for the invalid files in `folder`, each showing
    /// `suggestions` suggestions.
    ///
    /// Returns `None` if the folder does not exist.
    pub fn invalid_names(&self, folder: &str, suggestions: usize) -> Option<Vec<TransactionView>> {
        let files = self.invalid_files(folder)?;
        self.registry.prune_missing();
        Some(
            files
                .into_iter()
                .map(|file| self.view_for(&file, suggestions))
                .collect(),
        )
    }

    /// Transactions for every user folder. `None` if the library is missing.
    pub fn invalid_names_all(&self, suggestions: usize) -> Option<Vec<TransactionView>> {
        let folders = self.folders()?;
        self.registry.prune_missing();
        let mut views = Vec::new();
        for folder in folders {
            if let Some(files) = self.invalid_files(&folder) {
                views.extend(files.iter().map(|f| self.view_for(f, suggestions)));
            }
        }
        Some(views)
    }

    /// Number of invalid files in `folder`, or in the whole library for
    /// `None`. Creates no transactions.
    pub fn count_invalid(&self, folder: Option<&str>) -> Option<usize> {
        match folder {
            Some(folder) => self.invalid_files(folder).map(|f| f.len()),
            None => {
                let folders = self.folders()?;
                Some(
                    folders
                        .iter()
                        .filter_map(|f| self.invalid_files(f))
                        .map(|f| f.len())
                        .sum(),
                )
            }
        }
    }

    pub fn commit(&self, id: Uuid, target: CommitTarget) -> TransactionResponse {
        self.registry.commit(id, target)
    }

    /// Deletes the invalid file behind the transaction
    pub fn delete(&self, id: Uuid) -> TransactionResponse {
        self.registry.delete(id)
    }

    pub fn transaction(&self, id: Uuid) -> Option<Transaction> {
        self.registry.get(id)
    }

    /// Where `name` would put the transaction's file and whether something
    /// is already there. `None` if the transaction does not exist.
    pub fn file_exists_check(&self, id: Uuid, name: &str) -> Option<Suggestion> {
        let transaction = self.registry.get(id)?;
        let name = base_name(Path::new(name));
        Some(Suggestion::new(transaction.invalid_path(), &name, 0.0))
    }

    fn view_for(&self, file: &Path, suggestions: usize) -> TransactionView {
        self.registry.view_or_create(file, suggestions, || {
            let catalog = self
                .songs
                .read()
                .map(|s| s.list.clone())
                .unwrap_or_default();
            let suggestions = Suggestion::for_file(file, &catalog, MAX_SUGGESTIONS);
            Transaction::new(&self.root, file.to_path_buf(), suggestions)
        })
    }

    /// Immediate subfolders of the library, sorted
    fn folders(&self) -> Option<Vec<String>> {
        let entries = fs::read_dir(&self.root).ok()?;
        let mut folders: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        folders.sort();
        Some(folders)
    }

    fn folder_path(&self, folder: &str) -> Option<PathBuf> {
        let relative = Path::new(folder);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            tracing::warn!("Rejected folder outside the library: {}", folder);
            return None;
        }
        let path = self.root.join(relative);
        path.is_dir().then_some(path)
    }

    fn invalid_files(&self, folder: &str) -> Option<Vec<PathBuf>> {
        let dir = self.folder_path(folder)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("Failed to read {}: {}", dir.display(), e);
                return None;
            }
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.path())
            .filter(|p| has_extension(p, &self.extensions))
            .filter(|p| !self.is_valid_file(p))
            .collect();
        files.sort();
        Some(files)
    }
}

fn strip_page_counter<'a>(name: &'a str, delimiter: &str) -> Option<&'a str> {
    if delimiter.is_empty() {
        return None;
    }
    let (base, counter) = name.rsplit_once(delimiter)?;
    (!counter.is_empty() && counter.chars().all(|c| c.is_ascii_digit())).then_some(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use tempfile::TempDir;

    fn corrector(dir: &TempDir, songs: &[&str]) -> NameCorrector {
        let catalog = Arc::new(InMemoryCatalog::with_songs(songs.iter().copied()));
        NameCorrector::new(dir.path(), catalog, vec![".pdf".to_string()])
    }

    fn write(dir: &TempDir, relative: &str) {
        let path = dir.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"%PDF").unwrap();
    }

    #[test]
    fn test_only_invalid_names_listed() {
        let dir = TempDir::new().unwrap();
        write(&dir, "FolderA/Good Name.pdf");
        write(&dir, "FolderA/Bad Name.pdf");
        write(&dir, "FolderA/Bad Name.png");
        write(&dir, "FolderA/Archiv PDF/Old.pdf");
        let corrector = corrector(&dir, &["Good Name"]);

        let views = corrector.invalid_names("FolderA", 1).unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].invalid_file_name, "Bad Name.pdf");
        assert_eq!(views[0].folder.as_deref(), Some(Path::new("FolderA")));
        assert_eq!(views[0].suggestions[0].file_name, "Good Name");
        assert_eq!(corrector.count_invalid(Some("FolderA")), Some(1));
    }

    #[test]
    fn test_page_images_of_valid_names() {
        let dir = TempDir::new().unwrap();
        write(&dir, "FolderA/Good Name-001.png");
        write(&dir, "FolderA/Good Name.png");
        write(&dir, "FolderA/Bad Name-001.png");
        let catalog = Arc::new(InMemoryCatalog::with_songs(["Good Name"]));
        let extensions = vec![".pdf".to_string(), ".png".to_string()];
        let corrector =
            NameCorrector::new(dir.path(), catalog, extensions).with_page_delimiter("-");

        let views = corrector.invalid_names("FolderA", 1).unwrap();
        let names: Vec<_> = views.iter().map(|v| v.invalid_file_name.as_str()).collect();
        assert_eq!(names, vec!["Bad Name-001.png"]);
        assert!(!corrector.is_valid_file(Path::new("Good Name-001.pdf")));
    }

    #[test]
    fn test_missing_folder() {
        let dir = TempDir::new().unwrap();
        let corrector = corrector(&dir, &["Good Name"]);
        assert!(corrector.invalid_names("Nope", 1).is_none());
        assert!(corrector.invalid_names("../etc", 1).is_none());
        assert!(corrector.count_invalid(Some("Nope")).is_none());
    }

    #[test]
    fn test_listing_reuses_transactions() {
        let dir = TempDir::new().unwrap();
        write(&dir, "FolderA/Bad Name.pdf");
        let corrector = corrector(&dir, &["Good Name", "Other"]);

        let first = corrector.invalid_names("FolderA", 1).unwrap();
        let second = corrector.invalid_names("FolderA", 2).unwrap();
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(first[0].suggestions.len(), 1);
        assert_eq!(second[0].suggestions.len(), 2);
    }

    #[test]
    fn test_all_folders() {
        let dir = TempDir::new().unwrap();
        write(&dir, "FolderA/Bad.pdf");
        write(&dir, "FolderB/Worse.pdf");
        write(&dir, "FolderB/Good Name.pdf");
        let corrector = corrector(&dir, &["Good Name"]);

        let views = corrector.invalid_names_all(1).unwrap();
        let names: Vec<_> = views.iter().map(|v| v.invalid_file_name.as_str()).collect();
        assert_eq!(names, vec!["Bad.pdf", "Worse.pdf"]);
        assert_eq!(corrector.count_invalid(None), Some(2));
    }

    #[test]
    fn test_empty_catalog() {
        let dir = TempDir::new().unwrap();
        write(&dir, "FolderA/Good Name.pdf");
        let corrector = corrector(&dir, &[]);
        assert!(matches!(corrector.reload_data(), Err(Error::CatalogEmpty)));

        let views = corrector.invalid_names("FolderA", 3).unwrap();
        assert_eq!(views.len(), 1);
        assert!(views[0].suggestions.is_empty());
    }

    #[test]
    fn test_file_exists_check() {
        let dir = TempDir::new().unwrap();
        write(&dir, "FolderA/Bad Name.pdf");
        write(&dir, "FolderA/Taken.pdf");
        let corrector = corrector(&dir, &["Good Name"]);
        let id = corrector.invalid_names("FolderA", 1).unwrap()[0].id;

        let taken = corrector.file_exists_check(id, "Taken").unwrap();
        assert!(taken.file_exists);
        let free = corrector.file_exists_check(id, "Free.pdf").unwrap();
        assert!(!free.file_exists);
        assert_eq!(free.full_path, dir.path().join("FolderA/Free.pdf"));

        assert!(corrector.file_exists_check(Uuid::new_v4(), "Taken").is_none());
    }
}
