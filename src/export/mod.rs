//! Print and archival export of a rendered report.
//!
//! Export works from a [`RenderedSurface`] only. It never reads or changes
//! the report itself, so a failed export leaves everything else intact.

pub mod pdf;
pub mod print;
pub mod raster;

pub use print::print_ready;
pub use raster::{CommandRasterizer, RasterImage, RasterOptions, Rasterizer};

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::report::RenderedSurface;
use pdf::PageGeometry;
use std::path::{Path, PathBuf};
use tracing::info;

/// Page and raster settings for export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportLayout {
    pub page_width_mm: f64,
    pub page_height_mm: f64,
    pub margin_mm: f64,
    pub pixel_ratio: f64,
    pub css_width_px: u32,
    pub background: String,
}

impl Default for ExportLayout {
    fn default() -> Self {
        Self::from(&ExportConfig::default())
    }
}

impl From<&ExportConfig> for ExportLayout {
    fn from(config: &ExportConfig) -> Self {
        Self {
            page_width_mm: config.page_width_mm,
            page_height_mm: config.page_height_mm,
            margin_mm: config.margin_mm,
            pixel_ratio: config.pixel_ratio,
            css_width_px: config.css_width_px,
            background: config.background.clone(),
        }
    }
}

impl ExportLayout {
    fn raster_options(&self) -> RasterOptions {
        RasterOptions {
            css_width_px: self.css_width_px,
            pixel_ratio: self.pixel_ratio,
        }
    }

    fn geometry(&self) -> PageGeometry {
        PageGeometry {
            page_width_mm: self.page_width_mm,
            page_height_mm: self.page_height_mm,
        }
    }
}

/// A finished export artifact held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Page count for archives; `0` for print documents.
    pub pages: usize,
}

impl Artifact {
    /// Write the artifact into `dir`, creating the directory if needed.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)?;
        info!("Wrote {} ({} bytes)", path.display(), self.bytes.len());
        Ok(path)
    }
}

/// Produce the print-ready document as an artifact.
pub fn print_artifact(
    surface: Option<&RenderedSurface>,
    layout: &ExportLayout,
) -> Result<Artifact, ExportError> {
    let surface = surface.ok_or(ExportError::NotRendered)?;
    Ok(Artifact {
        file_name: format!("{}.print.html", surface.artifact_stem()),
        bytes: print_ready(surface, layout).into_bytes(),
        pages: 0,
    })
}

/// Rasterize the print-ready document and wrap it in a paginated PDF.
pub fn archive(
    surface: Option<&RenderedSurface>,
    rasterizer: &dyn Rasterizer,
    layout: &ExportLayout,
) -> Result<Artifact, ExportError> {
    let surface = surface.ok_or(ExportError::NotRendered)?;

    let html = print_ready(surface, layout);
    let bytes = rasterizer.rasterize(&html, &layout.raster_options())?;
    let image = RasterImage::parse(bytes)?;

    let geometry = layout.geometry();
    let pages = geometry.page_count(&image);
    info!(
        "Archiving {}x{} image across {} page(s)",
        image.width, image.height, pages
    );

    Ok(Artifact {
        file_name: format!("{}.pdf", surface.artifact_stem()),
        bytes: pdf::write_pdf(&image, geometry, &surface.title),
        pages,
    })
}

#[cfg(test)]
mod tests {
    use super::raster::fixtures::{jpeg, png};
    use super::*;
    use crate::report::fixtures::{now, sample};
    use crate::report::{render_surface, ReportDocument};
    use std::sync::Mutex;

    /// Returns canned bytes and records the HTML it was given.
    struct StubRasterizer {
        bytes: Vec<u8>,
        seen: Mutex<Vec<String>>,
    }

    impl StubRasterizer {
        fn new(bytes: Vec<u8>) -> Self {
            Self {
                bytes,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Rasterizer for StubRasterizer {
        fn rasterize(&self, html: &str, _options: &RasterOptions) -> Result<Vec<u8>, ExportError> {
            self.seen.lock().unwrap().push(html.to_string());
            Ok(self.bytes.clone())
        }
    }

    struct FailingRasterizer;

    impl Rasterizer for FailingRasterizer {
        fn rasterize(&self, _html: &str, _options: &RasterOptions) -> Result<Vec<u8>, ExportError> {
            Err(ExportError::Backend("display not available".to_string()))
        }
    }

    #[test]
    fn test_archive_without_surface() {
        let rasterizer = StubRasterizer::new(png(10, 10, 2, 0));
        let err = archive(None, &rasterizer, &ExportLayout::default()).unwrap_err();
        assert!(matches!(err, ExportError::NotRendered));
        assert!(rasterizer.seen.lock().unwrap().is_empty());

        assert!(matches!(
            print_artifact(None, &ExportLayout::default()),
            Err(ExportError::NotRendered)
        ));
    }

    #[test]
    fn test_archive_paginates() {
        let normalized = sample();
        let surface = render_surface(&ReportDocument::build(&normalized, now()));
        // 1588 px wide at ratio 2, tall enough for three pages
        let rasterizer = StubRasterizer::new(png(1588, 5000, 2, 0));

        let artifact = archive(Some(&surface), &rasterizer, &ExportLayout::default()).unwrap();
        assert_eq!(artifact.file_name, "RFP-2024-017-report.pdf");
        assert_eq!(artifact.pages, 3);
        assert!(artifact.bytes.starts_with(b"%PDF-"));

        let seen = rasterizer.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("@page { size: A4; margin: 10mm; }"));
        assert!(!seen[0].contains("id=\"actions\""));
    }

    #[test]
    fn test_archive_name_without_id() {
        let normalized = sample();
        let mut surface = render_surface(&ReportDocument::build(&normalized, now()));
        surface.report_id.clear();

        let rasterizer = StubRasterizer::new(jpeg(800, 600));
        let artifact = archive(Some(&surface), &rasterizer, &ExportLayout::default()).unwrap();
        assert_eq!(artifact.file_name, "report-report.pdf");
        assert_eq!(artifact.pages, 1);
    }

    #[test]
    fn test_archive_backend_failure() {
        let normalized = sample();
        let surface = render_surface(&ReportDocument::build(&normalized, now()));
        let err = archive(Some(&surface), &FailingRasterizer, &ExportLayout::default()).unwrap_err();
        assert!(matches!(err, ExportError::Backend(_)));
    }

    #[test]
    fn test_archive_rejects_alpha_png() {
        let normalized = sample();
        let surface = render_surface(&ReportDocument::build(&normalized, now()));
        let rasterizer = StubRasterizer::new(png(100, 100, 6, 0));
        let err = archive(Some(&surface), &rasterizer, &ExportLayout::default()).unwrap_err();
        assert!(matches!(err, ExportError::UnsupportedImage(_)));
    }

    #[test]
    fn test_artifact_write_to() {
        let normalized = sample();
        let surface = render_surface(&ReportDocument::build(&normalized, now()));
        let artifact = print_artifact(Some(&surface), &ExportLayout::default()).unwrap();
        assert_eq!(artifact.file_name, "RFP-2024-017-report.print.html");

        let dir = tempfile::tempdir().unwrap();
        let path = artifact.write_to(&dir.path().join("exports")).unwrap();
        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.contains("<!DOCTYPE html>"));
    }
}
