//! Who may list and fix invalid names

use std::sync::Arc;
use uuid::Uuid;

use crate::catalog::CatalogSource;

/// Outcome of a read check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadAccess {
    Denied,
    /// Allowed; `None` means every folder
    Granted { folder: Option<String> },
}

impl ReadAccess {
    pub fn is_granted(&self) -> bool {
        matches!(self, ReadAccess::Granted { .. })
    }
}

/// Authorization rules for the correction endpoints.
///
/// Administrators may do anything. Other users must exist in the catalog
/// and can only read their own folder; asking for all folders narrows the
/// request to theirs. Committing needs a transaction id handed out by a
/// read, so any known user may commit.
pub struct AccessPolicy {
    catalog: Arc<dyn CatalogSource>,
}

impl AccessPolicy {
    pub fn new(catalog: Arc<dyn CatalogSource>) -> Self {
        Self { catalog }
    }

    pub fn can_read(&self, admin: bool, user_id: Uuid, folder: Option<&str>) -> ReadAccess {
        let requested = folder.filter(|f| !f.is_empty()).map(str::to_string);
        if admin {
            return ReadAccess::Granted { folder: requested };
        }
        let Some(user) = self.catalog.user(user_id) else {
            return ReadAccess::Denied;
        };
        match requested {
            None => ReadAccess::Granted {
                folder: Some(user.folder),
            },
            Some(folder) if folder == user.folder => ReadAccess::Granted {
                folder: Some(folder),
            },
            Some(_) => ReadAccess::Denied,
        }
    }

    pub fn can_commit(&self, admin: bool, user_id: Uuid) -> bool {
        admin || self.catalog.user(user_id).is_some()
    }
}
