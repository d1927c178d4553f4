//! File name correction against the song catalog
//!
//! Files whose names are not catalog entries get a [`Transaction`] holding
//! the closest catalog names. A transaction is committed (the file renamed)
//! or deleted at most once.

mod corrector;
mod distance;
mod registry;
mod suggestion;
mod transaction;

pub use corrector::NameCorrector;
pub use distance::QGram;
pub use registry::TransactionRegistry;
pub use suggestion::{suggest, Candidate, Suggestion};
pub use transaction::{
    CommitTarget, Transaction, TransactionResponse, TransactionState, TransactionView,
    MAX_SUGGESTIONS,
};
