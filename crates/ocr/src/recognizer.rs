use std::collections::VecDeque;
use std::sync::Mutex;

use image::DynamicImage;
use thiserror::Error;

use crate::types::TextFragment;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image encode error: {0}")]
    ImageEncode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available — build with `tesseract` feature")]
    NotAvailable,
}

/// Abstraction over an OCR backend. Implementations take a cropped region
/// and return the recognized fragments with their bounding quadrilaterals.
pub trait OcrEngine: Send + Sync {
    fn read_regions(&self, image: &DynamicImage) -> Result<Vec<TextFragment>, OcrError>;
}

/// Process-wide OCR handle, constructed once at startup and injected into
/// the extractor. A failed engine construction yields `Unavailable`: every
/// read then degrades to an empty fragment list instead of crashing the run.
pub enum OcrService {
    Ready(Box<dyn OcrEngine>),
    Unavailable(String),
}

impl OcrService {
    pub fn new(engine: Result<Box<dyn OcrEngine>, OcrError>) -> Self {
        match engine {
            Ok(e) => OcrService::Ready(e),
            Err(e) => {
                tracing::warn!("OCR engine unavailable, extraction will be empty: {e}");
                OcrService::Unavailable(e.to_string())
            }
        }
    }

    pub fn ready(engine: impl OcrEngine + 'static) -> Self {
        OcrService::Ready(Box::new(engine))
    }

    pub fn is_available(&self) -> bool {
        matches!(self, OcrService::Ready(_))
    }

    /// Recognize a region, degrading to empty on engine errors — single-field
    /// OCR failures must never propagate past the extractor.
    pub fn read_regions(&self, image: &DynamicImage) -> Vec<TextFragment> {
        match self {
            OcrService::Ready(engine) => match engine.read_regions(image) {
                Ok(fragments) => fragments,
                Err(e) => {
                    tracing::warn!("OCR read failed: {e}");
                    Vec::new()
                }
            },
            OcrService::Unavailable(_) => Vec::new(),
        }
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns pre-queued fragment lists in call order, then empty lists.
/// Lets extraction tests script each field's OCR output without an engine.
pub struct MockOcr {
    queue: Mutex<VecDeque<Vec<TextFragment>>>,
}

impl MockOcr {
    pub fn new(responses: Vec<Vec<TextFragment>>) -> Self {
        Self { queue: Mutex::new(responses.into()) }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl OcrEngine for MockOcr {
    fn read_regions(&self, _image: &DynamicImage) -> Result<Vec<TextFragment>, OcrError> {
        Ok(self.queue.lock().expect("mock queue poisoned").pop_front().unwrap_or_default())
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrEngine, OcrError};
    use crate::types::TextFragment;
    use image::DynamicImage;
    use leptess::LepTess;
    use std::io::Cursor;
    use std::sync::Mutex;

    pub struct TesseractOcr {
        // LepTess is not Sync; the pipeline is single-threaded anyway.
        engine: Mutex<LepTess>,
    }

    impl TesseractOcr {
        pub fn new(data_path: Option<&str>, lang: &str) -> Result<Self, OcrError> {
            let lt = LepTess::new(data_path, lang).map_err(|e| OcrError::Engine(e.to_string()))?;
            Ok(Self { engine: Mutex::new(lt) })
        }
    }

    impl OcrEngine for TesseractOcr {
        fn read_regions(&self, image: &DynamicImage) -> Result<Vec<TextFragment>, OcrError> {
            let mut png = Vec::new();
            image
                .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
                .map_err(|e| OcrError::ImageEncode(e.to_string()))?;

            let mut lt = self.engine.lock().map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_image_from_mem(&png).map_err(|e| OcrError::Engine(e.to_string()))?;
            let text = lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))?;

            let text = text.trim().to_string();
            if text.is_empty() {
                return Ok(Vec::new());
            }
            // Region-level granularity: one fragment spanning the whole crop.
            Ok(vec![TextFragment::boxed(text, image.width() as f32, image.height() as f32)])
        }
    }
}
