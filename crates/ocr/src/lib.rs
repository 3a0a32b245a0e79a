pub mod extract;
pub mod hash;
pub mod preprocess;
pub mod rasterize;
pub mod recognizer;
pub mod types;

pub use extract::{ExtractError, Extraction, Extractor, RASTER_DPI};
pub use hash::crop_filename;
pub use preprocess::{blue_channel, deskew};
pub use rasterize::{MockRasterizer, PageRasterizer, PopplerRasterizer, RasterError};
pub use recognizer::{MockOcr, OcrEngine, OcrError, OcrService};
pub use types::{
    invoice_alt_price_map, invoice_map, primary_map, shipping_note_map, CoordinateMap,
    ExtractField, ExtractionResult, FieldSpec, FieldValue, Rect, TextFragment, ANCHOR_TOKEN,
};
