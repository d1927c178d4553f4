//! Rename transactions

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::suggestion::Suggestion;
use crate::utils::{base_name, file_name};

/// Upper bound on stored and displayed suggestions per transaction
pub const MAX_SUGGESTIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionState {
    Pending,
    Committed,
    Deleted,
}

/// How a transaction picks the new name
#[derive(Debug, Clone, PartialEq)]
pub enum CommitTarget {
    /// Position in the stored suggestion list
    Index(usize),
    /// One of the stored suggestions
    Suggestion(Suggestion),
    /// Any name typed by the user; an extension, if given, is dropped
    NewName(String),
}

/// Outcome of a commit or delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TransactionResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    pub fn not_found(id: Uuid) -> Self {
        Self::failed(format!("Transaction {} does not exist", id))
    }
}

/// Read-only snapshot of a pending transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionView {
    #[serde(rename = "transaction_guid")]
    pub id: Uuid,
    pub invalid_file_name: String,
    /// Folder of the invalid file, relative to the library root
    pub folder: Option<PathBuf>,
    pub suggestions: Vec<Suggestion>,
}

/// A pending proposal to rename one invalid file.
///
/// Holds at most [`MAX_SUGGESTIONS`] suggestions. Once committed or
/// deleted it rejects every further operation.
#[derive(Debug, Clone)]
pub struct Transaction {
    id: Uuid,
    invalid_path: PathBuf,
    relative_folder: Option<PathBuf>,
    suggestions: Vec<Suggestion>,
    state: TransactionState,
}

impl Transaction {
    pub fn new(
        library_root: &Path,
        invalid_path: PathBuf,
        mut suggestions: Vec<Suggestion>,
    ) -> Self {
        suggestions.truncate(MAX_SUGGESTIONS);
        let relative_folder = invalid_path
            .strip_prefix(library_root)
            .ok()
            .and_then(Path::parent)
            .map(Path::to_path_buf);
        Self {
            id: Uuid::new_v4(),
            invalid_path,
            relative_folder,
            suggestions,
            state: TransactionState::Pending,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn invalid_path(&self) -> &Path {
        &self.invalid_path
    }

    pub fn invalid_file_name(&self) -> String {
        file_name(&self.invalid_path)
    }

    pub fn relative_folder(&self) -> Option<&Path> {
        self.relative_folder.as_deref()
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Snapshot showing the first `count` suggestions (at most the cap)
    pub fn view(&self, count: usize) -> TransactionView {
        TransactionView {
            id: self.id,
            invalid_file_name: self.invalid_file_name(),
            folder: self.relative_folder.clone(),
            suggestions: self
                .suggestions
                .iter()
                .take(count.min(MAX_SUGGESTIONS))
                .cloned()
                .collect(),
        }
    }

    /// Renames the invalid file, replacing any file at the destination
    pub fn commit(&mut self, target: CommitTarget) -> TransactionResponse {
        if self.state != TransactionState::Pending {
            return already_committed();
        }
        match target {
            CommitTarget::Index(index) => match self.suggestions.get(index).cloned() {
                Some(suggestion) => self.apply(&suggestion),
                None => TransactionResponse::failed("Index out of range."),
            },
            CommitTarget::Suggestion(suggestion) => {
                if !self.suggestions.contains(&suggestion) {
                    return TransactionResponse::failed(format!(
                        "Suggestion \"{}\" does not belong into this transaction. \
                         Transaction was not committed.",
                        suggestion
                    ));
                }
                self.apply(&suggestion)
            }
            CommitTarget::NewName(name) => {
                let name = base_name(Path::new(&name));
                let suggestion = Suggestion::new(&self.invalid_path, &name, 0.0);
                if suggestion.is_noop() {
                    return TransactionResponse::failed(format!(
                        "New file name must be different from invalid file name ({})",
                        self.invalid_file_name()
                    ));
                }
                self.apply(&suggestion)
            }
        }
    }

    /// Deletes the invalid file
    pub fn delete(&mut self) -> TransactionResponse {
        if self.state != TransactionState::Pending {
            return already_committed();
        }
        if !self.invalid_path.exists() {
            return TransactionResponse::failed(format!(
                "File \"{}\" does not exist.",
                self.invalid_path.display()
            ));
        }
        if let Err(e) = fs::remove_file(&self.invalid_path) {
            return TransactionResponse::failed(format!(
                "File \"{}\" could not be deleted ({})",
                self.invalid_path.display(),
                e
            ));
        }
        tracing::info!("Invalid file {} was deleted", self.invalid_path.display());
        self.state = TransactionState::Deleted;
        self.suggestions.clear();
        TransactionResponse::ok()
    }

    fn apply(&mut self, suggestion: &Suggestion) -> TransactionResponse {
        if let Err(e) = fs::rename(&suggestion.invalid_path, &suggestion.full_path) {
            tracing::warn!(
                "Renaming {} to {} failed: {}",
                suggestion.invalid_path.display(),
                suggestion.full_path.display(),
                e
            );
            return TransactionResponse::failed(format!(
                "File {} could not be renamed to {}",
                suggestion.invalid_path.display(),
                suggestion.full_path.display()
            ));
        }
        tracing::info!(
            "File name {} was corrected to {}",
            suggestion.invalid_path.display(),
            file_name(&suggestion.full_path)
        );
        self.state = TransactionState::Committed;
        self.suggestions.clear();
        TransactionResponse::ok()
    }
}

fn already_committed() -> TransactionResponse {
    TransactionResponse::failed("Transaction is already committed.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(names: &[&str]) -> (TempDir, Transaction) {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("FolderA");
        fs::create_dir(&folder).unwrap();
        let invalid = folder.join("Bad Name.pdf");
        fs::write(&invalid, b"%PDF").unwrap();
        let suggestions = names
            .iter()
            .enumerate()
            .map(|(i, n)| Suggestion::new(&invalid, n, i as f64))
            .collect();
        let transaction = Transaction::new(dir.path(), invalid, suggestions);
        (dir, transaction)
    }

    #[test]
    fn test_new_transaction() {
        let names: Vec<String> = (0..15).map(|i| format!("Song {}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (_dir, transaction) = setup(&refs);

        assert_eq!(transaction.state(), TransactionState::Pending);
        assert_eq!(transaction.suggestions().len(), MAX_SUGGESTIONS);
        assert_eq!(transaction.relative_folder(), Some(Path::new("FolderA")));
        assert_eq!(transaction.invalid_file_name(), "Bad Name.pdf");

        assert_eq!(transaction.view(3).suggestions.len(), 3);
        assert_eq!(transaction.view(50).suggestions.len(), MAX_SUGGESTIONS);
    }

    #[test]
    fn test_commit_by_index() {
        let (dir, mut transaction) = setup(&["Good Name"]);
        let response = transaction.commit(CommitTarget::Index(0));
        assert!(response.success, "{:?}", response.message);
        assert_eq!(transaction.state(), TransactionState::Committed);
        assert!(dir.path().join("FolderA/Good Name.pdf").exists());
        assert!(!dir.path().join("FolderA/Bad Name.pdf").exists());

        let again = transaction.commit(CommitTarget::Index(0));
        assert!(!again.success);
        assert_eq!(again.message.as_deref(), Some("Transaction is already committed."));
    }

    #[test]
    fn test_commit_index_out_of_range() {
        let (dir, mut transaction) = setup(&["Good Name"]);
        let response = transaction.commit(CommitTarget::Index(1));
        assert_eq!(response.message.as_deref(), Some("Index out of range."));
        assert_eq!(transaction.state(), TransactionState::Pending);
        assert!(dir.path().join("FolderA/Bad Name.pdf").exists());
    }

    #[test]
    fn test_commit_foreign_suggestion() {
        let (dir, mut transaction) = setup(&["Good Name"]);
        let other = dir.path().join("FolderA/Other.pdf");
        let foreign = Suggestion::new(&other, "Good Name", 0.0);
        let response = transaction.commit(CommitTarget::Suggestion(foreign));
        assert!(!response.success);
        assert!(response.message.unwrap().contains("does not belong"));

        let own = transaction.suggestions()[0].clone();
        assert!(transaction.commit(CommitTarget::Suggestion(own)).success);
    }

    #[test]
    fn test_commit_new_name() {
        let (dir, mut transaction) = setup(&["Good Name"]);
        let response = transaction.commit(CommitTarget::NewName("Typed Name.txt".to_string()));
        assert!(response.success);
        assert!(dir.path().join("FolderA/Typed Name.pdf").exists());
    }

    #[test]
    fn test_commit_same_name_is_rejected() {
        let (dir, mut transaction) = setup(&["Good Name"]);
        let response = transaction.commit(CommitTarget::NewName("Bad Name".to_string()));
        assert!(!response.success);
        assert_eq!(
            response.message.as_deref(),
            Some("New file name must be different from invalid file name (Bad Name.pdf)")
        );
        assert!(dir.path().join("FolderA/Bad Name.pdf").exists());
        assert_eq!(transaction.state(), TransactionState::Pending);
    }

    #[test]
    fn test_commit_replaces_existing_file() {
        let (dir, mut transaction) = setup(&["Good Name"]);
        let target = dir.path().join("FolderA/Good Name.pdf");
        fs::write(&target, b"old").unwrap();
        assert!(transaction.commit(CommitTarget::Index(0)).success);
        assert_eq!(fs::read(&target).unwrap(), b"%PDF");
    }

    #[test]
    fn test_commit_missing_file_fails() {
        let (dir, mut transaction) = setup(&["Good Name"]);
        fs::remove_file(dir.path().join("FolderA/Bad Name.pdf")).unwrap();
        let response = transaction.commit(CommitTarget::Index(0));
        assert!(!response.success);
        assert!(response.message.unwrap().contains("could not be renamed"));
        assert_eq!(transaction.state(), TransactionState::Pending);
    }

    #[test]
    fn test_delete() {
        let (dir, mut transaction) = setup(&["Good Name"]);
        assert!(transaction.delete().success);
        assert_eq!(transaction.state(), TransactionState::Deleted);
        assert!(!dir.path().join("FolderA/Bad Name.pdf").exists());
        assert!(!transaction.delete().success);
        assert!(!transaction.commit(CommitTarget::Index(0)).success);
    }
}
