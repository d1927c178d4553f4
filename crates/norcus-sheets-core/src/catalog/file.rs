//! Catalog backed by plain files

use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use super::source::{CatalogSource, NorcusUser};
use crate::config::CatalogSettings;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct CatalogData {
    songs: Vec<String>,
    users: Vec<NorcusUser>,
}

/// Reads song names from a text file (one per line) and users from a JSON
/// array. Data is loaded lazily on first access and again on [`reload`].
///
/// [`reload`]: CatalogSource::reload
#[derive(Debug)]
pub struct FileCatalog {
    songs_file: Option<PathBuf>,
    users_file: Option<PathBuf>,
    data: RwLock<Option<CatalogData>>,
}

impl FileCatalog {
    pub fn new(songs_file: Option<PathBuf>, users_file: Option<PathBuf>) -> Self {
        Self {
            songs_file,
            users_file,
            data: RwLock::new(None),
        }
    }

    pub fn from_settings(settings: &CatalogSettings) -> Self {
        Self::new(settings.songs_file.clone(), settings.users_file.clone())
    }

    fn read(&self) -> Result<CatalogData> {
        let songs = match &self.songs_file {
            Some(path) => fs::read_to_string(path)?
                .lines()
                .map(|l| l.trim_end_matches('\r'))
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        };
        let users = match &self.users_file {
            Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
            None => Vec::new(),
        };
        Ok(CatalogData { songs, users })
    }

    fn with_data<T>(&self, f: impl Fn(&CatalogData) -> T) -> T {
        let loaded = self.data.read().map(|d| d.is_some()).unwrap_or(false);
        if !loaded {
            if let Err(e) = self.reload() {
                tracing::debug!("Catalog left empty after failed load: {}", e);
            }
        }
        match self.data.read() {
            Ok(guard) => match guard.as_ref() {
                Some(data) => f(data),
                None => f(&CatalogData::default()),
            },
            Err(_) => f(&CatalogData::default()),
        }
    }
}

impl CatalogSource for FileCatalog {
    fn song_names(&self) -> Vec<String> {
        self.with_data(|d| d.songs.clone())
    }

    fn users(&self) -> Vec<NorcusUser> {
        self.with_data(|d| d.users.clone())
    }

    fn reload(&self) -> Result<()> {
        let (data, result) = match self.read() {
            Ok(data) => {
                tracing::debug!(
                    "Catalog loaded: {} song(s), {} user(s)",
                    data.songs.len(),
                    data.users.len()
                );
                (data, Ok(()))
            }
            Err(e) => {
                tracing::error!("Failed to load catalog: {}", e);
                (CatalogData::default(), Err(Error::Catalog(e.to_string())))
            }
        };
        if let Ok(mut guard) = self.data.write() {
            *guard = Some(data);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use uuid::Uuid;

    #[test]
    fn test_load_songs_and_users() {
        let dir = TempDir::new().unwrap();
        let songs = dir.path().join("songs.txt");
        let users = dir.path().join("users.json");
        fs::write(&songs, "Good Name\r\nOther Song\n\n").unwrap();
        let id = Uuid::new_v4();
        fs::write(
            &users,
            format!(r#"[{{ "id": "{}", "folder": "FolderA", "admin": false }}]"#, id),
        )
        .unwrap();

        let catalog = FileCatalog::new(Some(songs), Some(users));
        assert_eq!(catalog.song_names(), vec!["Good Name", "Other Song"]);
        let user = catalog.user(id).unwrap();
        assert_eq!(user.folder, "FolderA");
        assert!(!user.admin);
    }

    #[test]
    fn test_reload_picks_up_changes() {
        let dir = TempDir::new().unwrap();
        let songs = dir.path().join("songs.txt");
        fs::write(&songs, "One\n").unwrap();

        let catalog = FileCatalog::new(Some(songs.clone()), None);
        assert_eq!(catalog.song_names(), vec!["One"]);

        fs::write(&songs, "One\nTwo\n").unwrap();
        assert_eq!(catalog.song_names().len(), 1);
        catalog.reload().unwrap();
        assert_eq!(catalog.song_names(), vec!["One", "Two"]);
    }

    #[test]
    fn test_unreachable_source_degrades_to_empty() {
        let dir = TempDir::new().unwrap();
        let songs = dir.path().join("songs.txt");
        fs::write(&songs, "One\n").unwrap();
        let catalog = FileCatalog::new(Some(songs.clone()), None);
        assert_eq!(catalog.song_names().len(), 1);

        fs::remove_file(&songs).unwrap();
        assert!(matches!(catalog.reload(), Err(Error::Catalog(_))));
        assert!(catalog.song_names().is_empty());
    }

    #[test]
    fn test_first_read_of_missing_source_is_empty() {
        let dir = TempDir::new().unwrap();
        let catalog = FileCatalog::new(Some(dir.path().join("missing.txt")), None);
        assert!(catalog.song_names().is_empty());
        assert!(catalog.users().is_empty());

        fs::write(dir.path().join("missing.txt"), "Late\n").unwrap();
        // The failed load is cached until the next reload
        assert!(catalog.song_names().is_empty());
        catalog.reload().unwrap();
        assert_eq!(catalog.song_names(), vec!["Late"]);
    }
}
