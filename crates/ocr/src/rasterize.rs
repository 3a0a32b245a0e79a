use std::path::{Path, PathBuf};
use std::process::Command;

use image::DynamicImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("pdftoppm failed: {0}")]
    Tool(String),
    #[error("page {page} does not exist in {path}")]
    MissingPage { path: String, page: usize },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode rendered page: {0}")]
    Decode(#[from] image::ImageError),
}

/// Renders one PDF page to a raster image at a given DPI.
pub trait PageRasterizer: Send + Sync {
    fn rasterize(&self, pdf: &Path, page: usize, dpi: u32) -> Result<DynamicImage, RasterError>;
}

// ── Poppler backend ───────────────────────────────────────────────────────────

/// Shells out to `pdftoppm` (poppler-utils). Rendered pages land in
/// `work_dir` and are decoded with the image crate.
pub struct PopplerRasterizer {
    work_dir: PathBuf,
}

impl PopplerRasterizer {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self { work_dir: work_dir.into() }
    }
}

impl PageRasterizer for PopplerRasterizer {
    fn rasterize(&self, pdf: &Path, page: usize, dpi: u32) -> Result<DynamicImage, RasterError> {
        std::fs::create_dir_all(&self.work_dir)?;
        let out_prefix = self.work_dir.join(format!("page_{page}"));
        let out_path = out_prefix.with_extension("png");

        // 1-based page numbering; -singlefile drops the page suffix.
        let page_arg = (page + 1).to_string();
        let dpi_arg = dpi.to_string();
        let output = Command::new("pdftoppm")
            .args([
                "-f", &page_arg,
                "-l", &page_arg,
                "-r", &dpi_arg,
                "-singlefile",
                "-png",
            ])
            .arg(pdf)
            .arg(&out_prefix)
            .output()
            .map_err(|e| RasterError::Tool(format!("failed to run pdftoppm: {e}")))?;

        if !output.status.success() {
            return Err(RasterError::Tool(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        if !out_path.exists() {
            // pdftoppm exits zero but writes nothing when the page is out of range.
            return Err(RasterError::MissingPage {
                path: pdf.display().to_string(),
                page,
            });
        }
        Ok(image::open(&out_path)?)
    }
}

// ── Mock backend (used for tests) ─────────────────────────────────────────────

/// Serves a preloaded image per page index, regardless of the PDF path.
pub struct MockRasterizer {
    pages: Vec<DynamicImage>,
}

impl MockRasterizer {
    pub fn new(pages: Vec<DynamicImage>) -> Self {
        Self { pages }
    }

    pub fn single(page: DynamicImage) -> Self {
        Self { pages: vec![page] }
    }
}

impl PageRasterizer for MockRasterizer {
    fn rasterize(&self, pdf: &Path, page: usize, _dpi: u32) -> Result<DynamicImage, RasterError> {
        self.pages.get(page).cloned().ok_or_else(|| RasterError::MissingPage {
            path: pdf.display().to_string(),
            page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    #[test]
    fn mock_serves_pages_by_index() {
        let r = MockRasterizer::new(vec![
            DynamicImage::ImageRgb8(RgbImage::new(10, 10)),
            DynamicImage::ImageRgb8(RgbImage::new(20, 20)),
        ]);
        assert_eq!(r.rasterize(Path::new("x.pdf"), 1, 300).unwrap().width(), 20);
    }

    #[test]
    fn mock_reports_missing_page() {
        let r = MockRasterizer::single(DynamicImage::ImageRgb8(RgbImage::new(10, 10)));
        let err = r.rasterize(Path::new("x.pdf"), 3, 300).unwrap_err();
        assert!(matches!(err, RasterError::MissingPage { page: 3, .. }));
    }
}
