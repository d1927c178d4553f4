//! Library scans and the auto-scan timer

mod auto;
mod scanner;

pub use auto::AutoScan;
pub use scanner::{LibraryScanner, ScanMode, ScanReport};
