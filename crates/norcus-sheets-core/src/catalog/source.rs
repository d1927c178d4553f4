//! Catalog access

use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;

/// A musician account, as far as authorization cares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NorcusUser {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// Library subfolder owned by this user
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub admin: bool,
}

/// Source of canonical song names and user records
pub trait CatalogSource: Send + Sync {
    /// Canonical song names, in catalog order
    fn song_names(&self) -> Vec<String>;

    fn users(&self) -> Vec<NorcusUser>;

    /// Fetches fresh data.
    ///
    /// On failure the source is left empty, so every file looks invalid
    /// rather than being matched against stale data.
    fn reload(&self) -> Result<()>;

    fn user(&self, id: Uuid) -> Option<NorcusUser> {
        self.users().into_iter().find(|u| u.id == id)
    }
}

/// Catalog kept in memory, filled by the caller
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    songs: RwLock<Vec<String>>,
    users: RwLock<Vec<NorcusUser>>,
}

impl InMemoryCatalog {
    pub fn new(songs: Vec<String>, users: Vec<NorcusUser>) -> Self {
        Self {
            songs: RwLock::new(songs),
            users: RwLock::new(users),
        }
    }

    pub fn with_songs<I, S>(songs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(songs.into_iter().map(Into::into).collect(), Vec::new())
    }

    pub fn set_songs(&self, songs: Vec<String>) {
        if let Ok(mut guard) = self.songs.write() {
            *guard = songs;
        }
    }

    pub fn set_users(&self, users: Vec<NorcusUser>) {
        if let Ok(mut guard) = self.users.write() {
            *guard = users;
        }
    }
}

impl CatalogSource for InMemoryCatalog {
    fn song_names(&self) -> Vec<String> {
        self.songs.read().map(|s| s.clone()).unwrap_or_default()
    }

    fn users(&self) -> Vec<NorcusUser> {
        self.users.read().map(|u| u.clone()).unwrap_or_default()
    }

    fn reload(&self) -> Result<()> {
        Ok(())
    }
}
