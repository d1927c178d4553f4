//! Service configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::convert::{ImageNaming, RenderSettings};
use crate::error::{Error, Result};

/// Raster format written for every converted page
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpg,
}

impl OutputFormat {
    /// File extension without the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpg => "jpg",
        }
    }

    pub fn image_format(&self) -> image::ImageFormat {
        match self {
            OutputFormat::Png => image::ImageFormat::Png,
            OutputFormat::Jpg => image::ImageFormat::Jpeg,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension().to_uppercase())
    }
}

/// Settings for the request layer sitting in front of the core
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiSettings {
    pub run_server: bool,
    pub port: u16,
    /// Shared secret used to verify request tokens
    pub key: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            run_server: true,
            port: 4434,
            key: String::new(),
        }
    }
}

/// Where the song catalog and the user records come from
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CatalogSettings {
    /// Text file with one canonical song name per line
    pub songs_file: Option<PathBuf>,
    /// JSON array of user records
    pub users_file: Option<PathBuf>,
}

/// Configuration for the sheet manager
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Root of the sheets library; every immediate subfolder is watched
    pub sheets_path: Option<PathBuf>,
    /// Extensions the watcher and the name corrector care about
    pub watched_extensions: Vec<String>,
    pub output_format: OutputFormat,
    pub multi_page_delimiter: String,
    /// Number of digits of the page counter (3 => "001")
    pub multi_page_counter_length: usize,
    pub multi_page_init_number: u32,
    pub dpi: u32,
    pub transparent_background: bool,
    /// Trim the page to its content and add a small margin
    pub crop_image: bool,
    /// Move converted PDFs into `pdf_subfolder`
    pub move_pdf_to_subfolder: bool,
    pub pdf_subfolder: String,
    /// Strip " (n)" duplicate markers added by Google Drive
    pub fix_gdrive_naming: bool,
    pub auto_scan: bool,
    pub auto_scan_interval_secs: u64,
    pub auto_scan_repeats: u32,
    pub api: ApiSettings,
    pub catalog: CatalogSettings,
    /// Ghostscript executable used for rendering and page counting
    pub ghostscript_path: PathBuf,
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sheets_path: None,
            watched_extensions: [".pdf", ".jpg", ".png", ".txt"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            output_format: OutputFormat::Png,
            multi_page_delimiter: "-".to_string(),
            multi_page_counter_length: 3,
            multi_page_init_number: 1,
            dpi: 200,
            transparent_background: false,
            crop_image: true,
            move_pdf_to_subfolder: true,
            pdf_subfolder: "Archiv PDF".to_string(),
            fix_gdrive_naming: true,
            auto_scan: false,
            auto_scan_interval_secs: 60,
            auto_scan_repeats: 5,
            api: ApiSettings::default(),
            catalog: CatalogSettings::default(),
            ghostscript_path: PathBuf::from("gs"),
            log_file: None,
        }
    }
}

impl Config {
    /// Default config file location
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("norcus-sheets").join("config.json"))
    }

    /// Load config from the default location
    pub fn load() -> Result<Self> {
        let path = Self::config_path()
            .ok_or_else(|| Error::Config("Config directory not found".to_string()))?;
        Self::load_from(&path)
    }

    /// Load config from `path`.
    ///
    /// A missing file is created with default values. A file that fails to
    /// deserialize falls back to defaults; an older file is rewritten so it
    /// picks up fields added since.
    pub fn load_from(path: &Path) -> Result<Self> {
        tracing::info!("Loading config file: {}", path.display());
        if !path.exists() {
            tracing::warn!(
                "Config file {} was not found, creating default config",
                path.display()
            );
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str::<Self>(&content) {
            Ok(config) => {
                if let Err(e) = config.save_to(path) {
                    tracing::warn!("Failed to refresh config file {}: {}", path.display(), e);
                }
                Ok(config)
            }
            Err(e) => {
                tracing::warn!("Deserialization of {} failed: {}", path.display(), e);
                Ok(Self::default())
            }
        }
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        tracing::debug!("Saving config file to {}", path.display());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Checks the settings the service cannot start without
    pub fn validate(&self) -> Result<&Path> {
        let sheets_path = self
            .sheets_path
            .as_deref()
            .ok_or_else(|| Error::Config("sheets_path is not set".to_string()))?;
        if !sheets_path.is_dir() {
            return Err(Error::Config(format!(
                "sheets_path {} is not a directory",
                sheets_path.display()
            )));
        }
        if self.multi_page_counter_length == 0 {
            return Err(Error::Config(
                "multi_page_counter_length must be at least 1".to_string(),
            ));
        }
        Ok(sheets_path)
    }

    /// Naming rules for derived images
    pub fn image_naming(&self) -> ImageNaming {
        ImageNaming {
            format: self.output_format,
            delimiter: self.multi_page_delimiter.clone(),
            counter_length: self.multi_page_counter_length,
            init_number: self.multi_page_init_number,
        }
    }

    /// Settings handed to the renderer
    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            dpi: self.dpi,
            format: self.output_format,
            transparent_background: self.transparent_background,
            crop_image: self.crop_image,
        }
    }

    /// Archive subfolder name, if converted PDFs should be moved away
    pub fn archive_subfolder(&self) -> Option<&str> {
        if self.move_pdf_to_subfolder && !self.pdf_subfolder.trim().is_empty() {
            Some(self.pdf_subfolder.as_str())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_creates_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "dpi": 300, "output_format": "jpg" }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.dpi, 300);
        assert_eq!(config.output_format, OutputFormat::Jpg);
        assert_eq!(config.pdf_subfolder, "Archiv PDF");
        assert_eq!(config.api.port, 4434);
    }

    #[test]
    fn test_broken_file_falls_back_to_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_validate_requires_sheets_path() {
        let mut config = Config::default();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let dir = TempDir::new().unwrap();
        config.sheets_path = Some(dir.path().join("missing"));
        assert!(config.validate().is_err());

        config.sheets_path = Some(dir.path().to_path_buf());
        assert_eq!(config.validate().unwrap(), dir.path());
    }

    #[test]
    fn test_archive_subfolder() {
        let mut config = Config::default();
        assert_eq!(config.archive_subfolder(), Some("Archiv PDF"));

        config.move_pdf_to_subfolder = false;
        assert_eq!(config.archive_subfolder(), None);
    }
}
