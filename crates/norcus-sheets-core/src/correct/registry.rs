//! In-memory store of pending transactions

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::transaction::{CommitTarget, Transaction, TransactionResponse, TransactionView};

#[derive(Default)]
struct Entries {
    by_id: HashMap<Uuid, Transaction>,
    by_path: HashMap<PathBuf, Uuid>,
}

impl Entries {
    fn remove(&mut self, id: Uuid) -> Option<Transaction> {
        let transaction = self.by_id.remove(&id)?;
        self.by_path.remove(transaction.invalid_path());
        Some(transaction)
    }
}

/// Pending transactions, one per invalid file.
///
/// Commit and delete take the transaction out of the registry before
/// touching the filesystem, so at most one of them ever runs for a given
/// id; a failed attempt is not retryable under the same id.
#[derive(Default)]
pub struct TransactionRegistry {
    entries: Mutex<Entries>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// View of the transaction for `invalid_path`, created with `create`
    /// if there is none yet
    pub fn view_or_create(
        &self,
        invalid_path: &Path,
        suggestions: usize,
        create: impl FnOnce() -> Transaction,
    ) -> TransactionView {
        let mut entries = self.lock();
        if let Some(id) = entries.by_path.get(invalid_path).copied() {
            if let Some(transaction) = entries.by_id.get(&id) {
                return transaction.view(suggestions);
            }
        }
        let transaction = create();
        let view = transaction.view(suggestions);
        entries
            .by_path
            .insert(transaction.invalid_path().to_path_buf(), transaction.id());
        entries.by_id.insert(transaction.id(), transaction);
        view
    }

    pub fn get(&self, id: Uuid) -> Option<Transaction> {
        self.lock().by_id.get(&id).cloned()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.lock().by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and returns the transaction
    pub fn claim(&self, id: Uuid) -> Option<Transaction> {
        self.lock().remove(id)
    }

    pub fn commit(&self, id: Uuid, target: CommitTarget) -> TransactionResponse {
        match self.claim(id) {
            Some(mut transaction) => transaction.commit(target),
            None => TransactionResponse::not_found(id),
        }
    }

    pub fn delete(&self, id: Uuid) -> TransactionResponse {
        match self.claim(id) {
            Some(mut transaction) => transaction.delete(),
            None => TransactionResponse::not_found(id),
        }
    }

    /// Drops transactions whose invalid file is gone, e.g. renamed by hand
    pub fn prune_missing(&self) -> usize {
        let mut entries = self.lock();
        let stale: Vec<Uuid> = entries
            .by_id
            .values()
            .filter(|t| !t.invalid_path().exists())
            .map(Transaction::id)
            .collect();
        for id in &stale {
            entries.remove(*id);
        }
        stale.len()
    }
}
