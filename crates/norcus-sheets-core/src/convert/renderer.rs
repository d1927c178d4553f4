//! PDF rasterization backends

use image::{imageops, DynamicImage, Rgba, RgbaImage};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::OutputFormat;
use crate::error::{Error, Result};

/// Margin added around cropped content (2 %)
const CROP_MARGIN: f64 = 1.02;

/// Per-channel difference still treated as background when cropping
const CROP_TOLERANCE: u8 = 8;

/// Settings passed to a renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    pub dpi: u32,
    pub format: OutputFormat,
    pub transparent_background: bool,
    pub crop_image: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            dpi: 200,
            format: OutputFormat::Png,
            transparent_background: false,
            crop_image: true,
        }
    }
}

/// One encoded page image, in the format requested by [`RenderSettings`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub data: Vec<u8>,
}

/// Turns a PDF into page images
pub trait Renderer: Send + Sync {
    /// Renders every page of `document`, in page order
    fn render(&self, document: &Path, settings: &RenderSettings) -> Result<Vec<RenderedPage>>;

    /// Number of pages of `document`
    fn page_count(&self, document: &Path) -> Result<usize>;
}

/// Renderer driving the Ghostscript command line
#[derive(Debug, Clone)]
pub struct GhostscriptRenderer {
    executable: PathBuf,
}

impl GhostscriptRenderer {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    fn scratch_dir() -> Result<PathBuf> {
        let dir = std::env::temp_dir().join(format!("norcus-sheets-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn render_into(
        &self,
        document: &Path,
        settings: &RenderSettings,
        scratch: &Path,
    ) -> Result<Vec<RenderedPage>> {
        let device = if settings.transparent_background {
            "pngalpha"
        } else {
            "png16m"
        };
        let output = Command::new(&self.executable)
            .arg("-q")
            .arg("-dSAFER")
            .arg("-dBATCH")
            .arg("-dNOPAUSE")
            .arg(format!("-sDEVICE={}", device))
            .arg(format!("-r{}", settings.dpi))
            .arg(format!("-sOutputFile={}", scratch.join("page-%05d.png").display()))
            .arg(document)
            .output()?;

        if !output.status.success() {
            return Err(Error::Render {
                path: document.to_path_buf(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let mut pages: Vec<PathBuf> = fs::read_dir(scratch)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        pages.sort();

        pages
            .iter()
            .map(|page| {
                let img = image::open(page)?.to_rgba8();
                let img = if settings.crop_image {
                    crop_to_content(img)
                } else {
                    img
                };
                encode(img, settings.format).map(|data| RenderedPage { data })
            })
            .collect()
    }
}

impl Renderer for GhostscriptRenderer {
    fn render(&self, document: &Path, settings: &RenderSettings) -> Result<Vec<RenderedPage>> {
        tracing::debug!(
            "Converting {} into {} image(s)",
            document.display(),
            settings.format
        );
        let scratch = Self::scratch_dir()?;
        let result = self.render_into(document, settings, &scratch);
        if let Err(e) = fs::remove_dir_all(&scratch) {
            tracing::warn!("Failed to remove {}: {}", scratch.display(), e);
        }
        result
    }

    fn page_count(&self, document: &Path) -> Result<usize> {
        let path = ghostscript_path(document);
        let output = Command::new(&self.executable)
            .arg("-q")
            .arg("-dQUIET")
            .arg("-dNODISPLAY")
            .arg("-dSAFER")
            .arg("-dBATCH")
            .arg("-dNOPAUSE")
            .arg("-dNOPROMPT")
            .arg(format!("--permit-file-read={}", path))
            .arg("-c")
            .arg(page_count_program(&path))
            .output()?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        match stdout.trim().parse::<usize>() {
            Ok(count) if count > 0 => Ok(count),
            _ => Err(Error::Render {
                path: document.to_path_buf(),
                message: format!("unable to get page count (output: {:?})", stdout.trim()),
            }),
        }
    }
}

/// Ghostscript accepts forward slashes on every platform
fn ghostscript_path(document: &Path) -> String {
    let path = document.to_string_lossy();
    if cfg!(windows) {
        path.replace('\\', "/")
    } else {
        path.into_owned()
    }
}

/// PostScript string literal holding `text`
fn postscript_string(text: &str) -> String {
    let mut literal = String::with_capacity(text.len() + 2);
    literal.push('(');
    for c in text.chars() {
        if matches!(c, '\\' | '(' | ')') {
            literal.push('\\');
        }
        literal.push(c);
    }
    literal.push(')');
    literal
}

fn page_count_program(path: &str) -> String {
    format!(
        "{} (r) file runpdfbegin pdfpagecount = quit",
        postscript_string(path)
    )
}

fn encode(img: RgbaImage, format: OutputFormat) -> Result<Vec<u8>> {
    let img = match format {
        OutputFormat::Png => DynamicImage::ImageRgba8(img),
        // JPEG has no alpha channel
        OutputFormat::Jpg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(img).to_rgb8()),
    };
    let mut data = Cursor::new(Vec::new());
    img.write_to(&mut data, format.image_format())?;
    Ok(data.into_inner())
}

fn is_background(pixel: &Rgba<u8>, background: &Rgba<u8>) -> bool {
    pixel
        .0
        .iter()
        .zip(background.0.iter())
        .all(|(a, b)| a.abs_diff(*b) <= CROP_TOLERANCE)
}

/// Trims borders of the background color (taken from the top-left corner)
/// and pads the content with a small margin.
fn crop_to_content(img: RgbaImage) -> RgbaImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img;
    }
    let background = *img.get_pixel(0, 0);

    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in img.enumerate_pixels() {
        if is_background(pixel, &background) {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    let Some((x0, y0, x1, y1)) = bounds else {
        return img;
    };

    let content_w = x1 - x0 + 1;
    let content_h = y1 - y0 + 1;
    let content = imageops::crop_imm(&img, x0, y0, content_w, content_h).to_image();

    let canvas_w = ((content_w as f64) * CROP_MARGIN).round() as u32;
    let canvas_h = ((content_h as f64) * CROP_MARGIN).round() as u32;
    let mut canvas = RgbaImage::from_pixel(canvas_w, canvas_h, background);
    imageops::overlay(
        &mut canvas,
        &content,
        i64::from((canvas_w - content_w) / 2),
        i64::from((canvas_h - content_h) / 2),
    );
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_to_content() {
        let white = Rgba([255, 255, 255, 255]);
        let black = Rgba([0, 0, 0, 255]);
        let mut img = RgbaImage::from_pixel(200, 100, white);
        for x in 50..150 {
            for y in 20..70 {
                img.put_pixel(x, y, black);
            }
        }

        let cropped = crop_to_content(img);
        assert_eq!(cropped.dimensions(), (102, 51));
        assert_eq!(*cropped.get_pixel(0, 0), white);
        assert_eq!(*cropped.get_pixel(51, 25), black);
    }

    #[test]
    fn test_crop_blank_page_is_unchanged() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
        assert_eq!(crop_to_content(img).dimensions(), (10, 10));
    }

    #[test]
    fn test_encode_formats() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]));
        let png = encode(img.clone(), OutputFormat::Png).unwrap();
        assert_eq!(&png[1..4], b"PNG");

        let jpg = encode(img, OutputFormat::Jpg).unwrap();
        assert_eq!(&jpg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_postscript_string_escapes_delimiters() {
        assert_eq!(postscript_string("/a/Song.pdf"), "(/a/Song.pdf)");
        assert_eq!(
            postscript_string("x) (%pipe%touch y) (w) file (.pdf"),
            r"(x\) \(%pipe%touch y\) \(w\) file \(.pdf)"
        );
        assert_eq!(postscript_string(r"a\b"), r"(a\\b)");
    }

    #[cfg(unix)]
    #[test]
    fn test_page_count_passes_escaped_path() {
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let gs = dir.path().join("gs");
        let log = dir.path().join("args.log");
        fs::write(
            &gs,
            format!("#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\necho 4\n", log.display()),
        )
        .unwrap();
        fs::set_permissions(&gs, fs::Permissions::from_mode(0o755)).unwrap();

        let document = dir.path().join("x) (%pipe%touch pwned) (w) file (.pdf");
        let renderer = GhostscriptRenderer::new(&gs);
        // A freshly written script can be briefly busy while other tests fork
        let mut count = renderer.page_count(&document);
        for _ in 0..5 {
            if count.is_ok() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(50));
            count = renderer.page_count(&document);
        }
        assert_eq!(count.unwrap(), 4);

        let args: Vec<String> = fs::read_to_string(&log)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        assert!(args.contains(&"-dSAFER".to_string()));
        assert!(!args.contains(&"-dNOSAFER".to_string()));
        let program = &args[args.iter().position(|a| a == "-c").unwrap() + 1];
        assert_eq!(
            program,
            &format!(
                r"({}/x\) \(%pipe%touch pwned\) \(w\) file \(.pdf) (r) file runpdfbegin pdfpagecount = quit",
                dir.path().display()
            )
        );
        assert!(!dir.path().join("pwned").exists());
    }

    #[test]
    fn test_missing_executable_is_an_error() {
        let renderer = GhostscriptRenderer::new("/nonexistent/gs-binary");
        let result = renderer.render(Path::new("/tmp/none.pdf"), &RenderSettings::default());
        assert!(result.is_err());
        assert!(renderer.page_count(Path::new("/tmp/none.pdf")).is_err());
    }
}
