//! Naming convention of derived images

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::OutputFormat;
use crate::error::Result;

/// How page images of a document are named.
///
/// A single-page document "Song.pdf" becomes "Song.png"; a multi-page one
/// becomes "Song-001.png", "Song-002.png", ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageNaming {
    pub format: OutputFormat,
    pub delimiter: String,
    /// Minimum number of digits of the page counter
    pub counter_length: usize,
    /// Number of the first page
    pub init_number: u32,
}

impl Default for ImageNaming {
    fn default() -> Self {
        Self {
            format: OutputFormat::Png,
            delimiter: "-".to_string(),
            counter_length: 3,
            init_number: 1,
        }
    }
}

impl ImageNaming {
    /// Zero-padded page counter; numbers wider than the counter are kept whole
    pub fn counter(&self, number: u32) -> String {
        format!("{:0width$}", number, width = self.counter_length)
    }

    /// File name of page `index` (0-based) out of `total`
    pub fn image_name(&self, base: &str, index: usize, total: usize) -> String {
        let ext = self.format.extension();
        if total <= 1 {
            format!("{}.{}", base, ext)
        } else {
            let number = self.init_number.saturating_add(index as u32);
            format!("{}{}{}.{}", base, self.delimiter, self.counter(number), ext)
        }
    }

    /// Pattern matching every derived image of `base`.
    ///
    /// Stray duplicate markers ("Song-001 (1).png") are tolerated so they get
    /// cleaned up on the next conversion.
    pub fn image_pattern(&self, base: &str) -> Result<Regex> {
        let pattern = format!(
            r"^{}({}\d+)?( \(\d+\))?\.{}$",
            regex::escape(base),
            regex::escape(&self.delimiter),
            regex::escape(self.format.extension())
        );
        Ok(Regex::new(&pattern)?)
    }

    /// Derived images of `base` inside `dir`, sorted by name
    pub fn find_images(&self, dir: &Path, base: &str) -> Result<Vec<PathBuf>> {
        let pattern = self.image_pattern(base)?;
        let mut images: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter(|e| pattern.is_match(&e.file_name().to_string_lossy()))
            .map(|e| e.path())
            .collect();
        images.sort();
        Ok(images)
    }

    /// Name of `image` after its document was renamed from `old_base` to
    /// `new_base`
    pub fn renamed_image_name(image_name: &str, old_base: &str, new_base: &str) -> String {
        match image_name.strip_prefix(old_base) {
            Some(rest) => format!("{}{}", new_base, rest),
            None => image_name.to_string(),
        }
    }
}
