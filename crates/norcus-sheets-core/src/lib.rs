//! # norcus-sheets-core
//!
//! Core library keeping a library of scanned sheet-music PDFs in sync with
//! their rendered page images, and fixing file names against a song catalog.
//!
//! This crate provides the foundational functionality for:
//! - Converting PDFs into page images and keeping them fresh
//! - Watching the library folders and reacting to changes
//! - Removing the " (n)" duplicate markers added by cloud sync clients
//! - Full, deep and forced library scans, optionally on a timer
//! - Ranking catalog names against invalid file names and renaming files
//!   through short-lived transactions
//!
//! ## Modules
//!
//! - [`access`] - Read and commit authorization rules
//! - [`catalog`] - Song names and user records
//! - [`config`] - Configuration loading and validation
//! - [`convert`] - Rendering, image naming and the conversion pipeline
//! - [`correct`] - Name matching and rename transactions
//! - [`error`] - Error types and Result alias
//! - [`manager`] - The context object tying everything together
//! - [`normalize`] - Duplicate marker removal
//! - [`scan`] - Library scans and the auto-scan timer
//! - [`watch`] - File watching and event dispatch
//!
//! ## Example
//!
//! ```no_run
//! use norcus_sheets_core::{Config, SheetsManager};
//!
//! let config = Config::load().expect("Failed to load config");
//! let manager = SheetsManager::from_config(config).expect("Invalid config");
//!
//! if let Some(report) = manager.full_scan() {
//!     println!("Converted {} of {} files", report.converted, report.documents);
//! }
//! manager.start_watching().expect("Failed to watch library");
//! ```

// Module declarations
pub mod access;
pub mod catalog;
pub mod config;
pub mod convert;
pub mod correct;
pub mod error;
pub mod manager;
pub mod normalize;
pub mod scan;
pub mod utils;
pub mod watch;

// Re-export key types for convenience

// Error types
pub use error::{Error, Result};

// Configuration
pub use config::{ApiSettings, CatalogSettings, Config, OutputFormat};

// Conversion
pub use convert::{
    ConversionPipeline, GhostscriptRenderer, ImageNaming, PageCheck, RenderSettings,
    RenderedPage, Renderer, SyncOutcome,
};

// Duplicate markers
pub use normalize::{normalize_all, normalize_file, NormalizeReport, VersionedFile};

// Watching
pub use watch::{DispatchOutcome, EventDispatcher, FileChangeEvent, LibraryWatcher, WatchGate};

// Scanning
pub use scan::{AutoScan, LibraryScanner, ScanMode, ScanReport};

// Catalog and name correction
pub use catalog::{CatalogSource, FileCatalog, InMemoryCatalog, NorcusUser};
pub use correct::{
    CommitTarget, NameCorrector, QGram, Suggestion, Transaction, TransactionResponse,
    TransactionView,
};

// Access and the manager
pub use access::{AccessPolicy, ReadAccess};
pub use manager::{FixReport, SheetsManager};
