use std::path::{Path, PathBuf};

use image::DynamicImage;
use thiserror::Error;

use crate::hash::crop_filename;
use crate::preprocess;
use crate::rasterize::{PageRasterizer, RasterError};
use crate::recognizer::OcrService;
use crate::types::{
    CoordinateMap, ExtractField, ExtractionResult, FieldValue, Rect, ANCHOR_TOKEN,
};

pub const RASTER_DPI: u32 = 300;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to save crop: {0}")]
    Save(#[from] image::ImageError),
}

/// Everything extraction produces for one (file, map) pair: the per-field
/// values plus the crop images written for the preview surfaces.
#[derive(Debug, Default)]
pub struct Extraction {
    pub values: ExtractionResult,
    pub images: Vec<(ExtractField, PathBuf)>,
}

impl Extraction {
    pub fn text(&self, field: ExtractField) -> Option<&str> {
        self.values.get(&field).and_then(FieldValue::as_text)
    }

    pub fn candidates(&self, field: ExtractField) -> &[(String, u32)] {
        self.values.get(&field).and_then(FieldValue::as_candidates).unwrap_or(&[])
    }
}

/// Coordinate-map field extractor for rasterized PDF pages.
pub struct Extractor<'a> {
    rasterizer: &'a dyn PageRasterizer,
    ocr: &'a OcrService,
}

impl<'a> Extractor<'a> {
    pub fn new(rasterizer: &'a dyn PageRasterizer, ocr: &'a OcrService) -> Self {
        Self { rasterizer, ocr }
    }

    /// Extract every field the map declares from one page of `pdf`, saving
    /// crops under `save_dir`. Fails soft: any per-file error yields an empty
    /// extraction, logged but never propagated, so one bad scan cannot kill
    /// the run.
    pub fn extract(
        &self,
        pdf: &Path,
        map: &CoordinateMap,
        save_dir: &Path,
        apply_deskew: bool,
        page: usize,
    ) -> Extraction {
        match self.try_extract(pdf, map, save_dir, apply_deskew, page) {
            Ok(extraction) => extraction,
            Err(e) => {
                tracing::warn!("extraction failed for {} ({}): {e}", pdf.display(), map.name);
                Extraction::default()
            }
        }
    }

    fn try_extract(
        &self,
        pdf: &Path,
        map: &CoordinateMap,
        save_dir: &Path,
        apply_deskew: bool,
        page: usize,
    ) -> Result<Extraction, ExtractError> {
        let mut image = self.rasterizer.rasterize(pdf, page, RASTER_DPI)?;
        if apply_deskew {
            image = preprocess::deskew(&image);
        }
        std::fs::create_dir_all(save_dir)?;

        let (dx, dy) = match map.anchor {
            Some(anchor_rect) => self.anchor_offset(&image, anchor_rect, pdf, save_dir)?,
            None => (0, 0),
        };

        let mut extraction = Extraction::default();
        for spec in &map.fields {
            let rect = spec.rect.shifted(dx, dy);
            let Some(crop) = crop_clamped(&image, rect) else {
                tracing::warn!("field {:?} rect {rect:?} is outside the page", spec.field);
                extraction.values.insert(spec.field, empty_value(spec.multi));
                continue;
            };

            let processed = if spec.blue_channel {
                DynamicImage::ImageLuma8(preprocess::blue_channel(&crop, spec.binarize))
            } else {
                crop
            };

            let crop_path = save_dir.join(crop_filename(pdf, spec.field.label()));
            processed.save(&crop_path)?;
            extraction.images.push((spec.field, crop_path));

            let fragments = self.ocr.read_regions(&processed);
            // Multi-candidate fields keep every fragment; height policy for
            // them lives with the per-field cleaners.
            let value = if spec.multi {
                FieldValue::Candidates(
                    fragments
                        .into_iter()
                        .map(|f| {
                            let height = f.height();
                            (f.text, height)
                        })
                        .collect(),
                )
            } else {
                let joined = fragments
                    .iter()
                    .filter(|f| f.height() >= spec.min_height)
                    .map(|f| f.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                FieldValue::Text(joined.trim().to_string())
            };
            extraction.values.insert(spec.field, value);
        }

        Ok(extraction)
    }

    /// Locate the anchor token inside the declared anchor region. The found
    /// fragment's top-left (relative to the region origin) is the drift the
    /// whole map is shifted by. Not finding the token is a recoverable
    /// degradation: extraction proceeds with the unadjusted map.
    fn anchor_offset(
        &self,
        image: &DynamicImage,
        anchor_rect: Rect,
        pdf: &Path,
        save_dir: &Path,
    ) -> Result<(i32, i32), ExtractError> {
        let Some(crop) = crop_clamped(image, anchor_rect) else {
            return Ok((0, 0));
        };
        // Keep the anchor crop on disk for operator inspection.
        crop.save(save_dir.join(crop_filename(pdf, "anchor")))?;

        for fragment in self.ocr.read_regions(&crop) {
            if fragment.text.contains(ANCHOR_TOKEN) {
                let (dx, dy) = fragment.top_left();
                tracing::debug!(
                    "anchor '{ANCHOR_TOKEN}' found at ({dx}, {dy}) in {}",
                    pdf.display()
                );
                return Ok((dx, dy));
            }
        }
        tracing::debug!("anchor '{ANCHOR_TOKEN}' not found in {}; offset (0, 0)", pdf.display());
        Ok((0, 0))
    }
}

fn empty_value(multi: bool) -> FieldValue {
    if multi {
        FieldValue::Candidates(Vec::new())
    } else {
        FieldValue::Text(String::new())
    }
}

/// Crop `rect` out of the image, clamped to the page bounds. Returns `None`
/// when nothing of the rectangle lies on the page.
fn crop_clamped(image: &DynamicImage, rect: Rect) -> Option<DynamicImage> {
    let x0 = rect.x.max(0) as u32;
    let y0 = rect.y.max(0) as u32;
    if x0 >= image.width() || y0 >= image.height() {
        return None;
    }
    let x1 = (x0 + rect.w).min(image.width());
    let y1 = (y0 + rect.h).min(image.height());
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(image.crop_imm(x0, y0, x1 - x0, y1 - y0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterize::MockRasterizer;
    use crate::recognizer::{MockOcr, OcrError, OcrService};
    use crate::types::{primary_map, CoordinateMap, FieldSpec, TextFragment};
    use image::RgbImage;

    fn page(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, image::Rgb([255u8, 255, 255])))
    }

    fn single_field_map(field: ExtractField, rect: Rect, multi: bool) -> CoordinateMap {
        CoordinateMap {
            name: "test",
            anchor: None,
            fields: vec![FieldSpec {
                field,
                rect,
                multi,
                min_height: 0,
                blue_channel: false,
                binarize: None,
            }],
        }
    }

    #[test]
    fn single_value_field_joins_fragments() {
        let raster = MockRasterizer::single(page(1000, 1000));
        let ocr = OcrService::ready(MockOcr::new(vec![vec![
            TextFragment::boxed("20 000", 200.0, 40.0),
            TextFragment::boxed("нетто", 100.0, 40.0),
        ]]));
        let dir = tempfile::tempdir().unwrap();
        let map = single_field_map(ExtractField::Weight, Rect::new(100, 100, 300, 80), false);

        let e = Extractor::new(&raster, &ocr).extract(Path::new("1.pdf"), &map, dir.path(), false, 0);
        assert_eq!(e.text(ExtractField::Weight), Some("20 000 нетто"));
        assert_eq!(e.images.len(), 1);
        assert!(e.images[0].1.exists());
    }

    #[test]
    fn min_height_filter_drops_short_fragments() {
        let raster = MockRasterizer::single(page(1000, 1000));
        let ocr = OcrService::ready(MockOcr::new(vec![vec![
            TextFragment::boxed("шум", 40.0, 10.0),
            TextFragment::boxed("Иванов", 200.0, 42.0),
        ]]));
        let dir = tempfile::tempdir().unwrap();
        let mut map = single_field_map(ExtractField::Date, Rect::new(0, 0, 400, 150), false);
        map.fields[0].min_height = 20;

        let e = Extractor::new(&raster, &ocr).extract(Path::new("1.pdf"), &map, dir.path(), false, 0);
        assert_eq!(e.text(ExtractField::Date), Some("Иванов"));
    }

    #[test]
    fn multi_field_keeps_all_candidates_with_heights() {
        let raster = MockRasterizer::single(page(1000, 1000));
        let ocr = OcrService::ready(MockOcr::new(vec![vec![
            TextFragment::boxed("25", 30.0, 20.0),
            TextFragment::boxed("Иванов И.", 300.0, 42.0),
        ]]));
        let dir = tempfile::tempdir().unwrap();
        let map = single_field_map(ExtractField::DriverName, Rect::new(0, 0, 500, 150), true);

        let e = Extractor::new(&raster, &ocr).extract(Path::new("1.pdf"), &map, dir.path(), false, 0);
        assert_eq!(
            e.candidates(ExtractField::DriverName),
            &[("25".to_string(), 20), ("Иванов И.".to_string(), 42)]
        );
    }

    #[test]
    fn multi_field_ignores_min_height() {
        // The plate layout declares min_height 38, but the candidate list
        // must keep shorter fragments: the plate cleaner accepts heights
        // down to 36 and filtering here would make those unreachable.
        let raster = MockRasterizer::single(page(1000, 1000));
        let ocr = OcrService::ready(MockOcr::new(vec![vec![
            TextFragment::boxed("123ABC/01", 300.0, 36.0),
            TextFragment::boxed("VOLVO", 200.0, 40.0),
        ]]));
        let dir = tempfile::tempdir().unwrap();
        let mut map = single_field_map(ExtractField::Plate, Rect::new(0, 0, 700, 170), true);
        map.fields[0].min_height = 38;

        let e = Extractor::new(&raster, &ocr).extract(Path::new("1.pdf"), &map, dir.path(), false, 0);
        assert_eq!(
            e.candidates(ExtractField::Plate),
            &[("123ABC/01".to_string(), 36), ("VOLVO".to_string(), 40)]
        );
    }

    #[test]
    fn anchor_offset_shifts_every_field() {
        // Anchor token found at (30, 40) inside the anchor crop: the date
        // rect must shift accordingly. The mock queue answers the anchor
        // read first, then the field read.
        let raster = MockRasterizer::single(page(3000, 3500));
        let ocr = OcrService::ready(MockOcr::new(vec![
            vec![TextFragment {
                text: "ИНН 123".into(),
                quad: [(30.0, 40.0), (130.0, 40.0), (130.0, 80.0), (30.0, 80.0)],
                confidence: 0.9,
            }],
            vec![TextFragment::boxed("15.01.2026", 300.0, 40.0)],
        ]));
        let dir = tempfile::tempdir().unwrap();
        let map = CoordinateMap {
            name: "test",
            anchor: Some(Rect::new(0, 500, 500, 1000)),
            fields: vec![FieldSpec {
                field: ExtractField::Date,
                rect: Rect::new(880, 2520, 390, 140),
                multi: false,
                min_height: 0,
                blue_channel: false,
                binarize: None,
            }],
        };

        let e = Extractor::new(&raster, &ocr).extract(Path::new("1.pdf"), &map, dir.path(), false, 0);
        assert_eq!(e.text(ExtractField::Date), Some("15.01.2026"));
        // anchor crop + field crop were both written
        assert_eq!(e.images.len(), 1);
        let anchor_png = dir.path().join(crop_filename(Path::new("1.pdf"), "anchor"));
        assert!(anchor_png.exists());
    }

    #[test]
    fn missing_anchor_token_is_recoverable() {
        let raster = MockRasterizer::single(page(3000, 3500));
        let ocr = OcrService::ready(MockOcr::new(vec![
            vec![TextFragment::boxed("что-то другое", 100.0, 30.0)],
            vec![TextFragment::boxed("15.01.2026", 300.0, 40.0)],
        ]));
        let dir = tempfile::tempdir().unwrap();
        let mut map = primary_map();
        map.fields.truncate(1); // keep only the date field

        let e = Extractor::new(&raster, &ocr).extract(Path::new("1.pdf"), &map, dir.path(), false, 0);
        assert_eq!(e.text(ExtractField::Date), Some("15.01.2026"));
    }

    #[test]
    fn missing_page_degrades_to_empty_extraction() {
        let raster = MockRasterizer::new(vec![]);
        let ocr = OcrService::ready(MockOcr::empty());
        let dir = tempfile::tempdir().unwrap();

        let e = Extractor::new(&raster, &ocr)
            .extract(Path::new("1.pdf"), &primary_map(), dir.path(), true, 0);
        assert!(e.values.is_empty());
        assert!(e.images.is_empty());
    }

    #[test]
    fn unavailable_ocr_yields_empty_field_values() {
        let raster = MockRasterizer::single(page(3000, 3500));
        let ocr = OcrService::new(Err(OcrError::NotAvailable));
        let dir = tempfile::tempdir().unwrap();

        let e = Extractor::new(&raster, &ocr)
            .extract(Path::new("1.pdf"), &primary_map(), dir.path(), false, 0);
        assert_eq!(e.text(ExtractField::Date), Some(""));
        assert!(e.candidates(ExtractField::DriverName).is_empty());
    }
}
