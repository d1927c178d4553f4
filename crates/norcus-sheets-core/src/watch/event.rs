//! Filesystem change events

use std::path::{Path, PathBuf};

/// A debounced change inside a watched library folder.
///
/// Produced by [`LibraryWatcher`](super::LibraryWatcher) and consumed by
/// [`EventDispatcher`](super::EventDispatcher); tests build them by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChangeEvent {
    /// A file appeared (created, or moved in from outside)
    Created { path: PathBuf },
    /// A file's content changed
    Modified { path: PathBuf },
    /// A file disappeared
    Deleted { path: PathBuf },
    /// A file was renamed inside the watched folder
    Renamed { from: PathBuf, to: PathBuf },
}

impl FileChangeEvent {
    /// Returns the primary path associated with this event.
    pub fn path(&self) -> &Path {
        match self {
            Self::Created { path } => path,
            Self::Modified { path } => path,
            Self::Deleted { path } => path,
            Self::Renamed { to, .. } => to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_path() {
        let created = FileChangeEvent::Created {
            path: PathBuf::from("/s/A/Song.pdf"),
        };
        assert_eq!(created.path(), Path::new("/s/A/Song.pdf"));

        let renamed = FileChangeEvent::Renamed {
            from: PathBuf::from("/s/A/Old.pdf"),
            to: PathBuf::from("/s/A/New.pdf"),
        };
        assert_eq!(renamed.path(), Path::new("/s/A/New.pdf"));
    }
}
