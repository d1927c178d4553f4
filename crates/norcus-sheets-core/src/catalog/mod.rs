//! Song catalog and user records

mod file;
mod source;

pub use file::FileCatalog;
pub use source::{CatalogSource, InMemoryCatalog, NorcusUser};
