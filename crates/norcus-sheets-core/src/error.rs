//! Error types for norcus-sheets-core

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for sheet management operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to render {path}: {message}")]
    Render { path: PathBuf, message: String },

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("No songs were loaded from the catalog")]
    CatalogEmpty,

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Invalid file name pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for sheet management operations
pub type Result<T> = std::result::Result<T, Error>;
