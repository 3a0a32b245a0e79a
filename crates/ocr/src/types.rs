use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Pixel-space rectangle at the fixed 300 DPI rasterization resolution.
/// `x`/`y` may be negative in the declared maps (scans can bleed past the
/// page edge); crops clamp to the image bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn shifted(self, dx: i32, dy: i32) -> Self {
        Rect { x: (self.x + dx).max(0), y: (self.y + dy).max(0), ..self }
    }
}

/// Fields the extractor knows how to locate on the three document layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtractField {
    Date,
    DriverName,
    Weight,
    Brand,
    Plate,
    Price,
    PriceAlt,
    InvoiceNumber,
    NoteNumber,
    NoteDate,
}

impl ExtractField {
    /// Stable ASCII label used in crop file names.
    pub fn label(self) -> &'static str {
        match self {
            ExtractField::Date => "date_1",
            ExtractField::DriverName => "fio_vodit_4",
            ExtractField::Weight => "kol_ton_7",
            ExtractField::Brand => "marka_2",
            ExtractField::Plate => "gos_nomer_3",
            ExtractField::Price => "cena_8",
            ExtractField::PriceAlt => "cena_8_alt",
            ExtractField::InvoiceNumber => "schet_fakt_16",
            ExtractField::NoteNumber => "sopr_nakl_kz_15",
            ExtractField::NoteDate => "data_sopr_nakl_13",
        }
    }
}

/// How one field is extracted: where to crop, whether to keep the raw
/// candidate list, and which pre-processing to apply before OCR.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub field: ExtractField,
    pub rect: Rect,
    /// Keep the `(text, height)` candidate list instead of joined text.
    pub multi: bool,
    /// Fragments shorter than this are dropped from the joined text.
    /// Candidate lists are never filtered here; the cleaners own their
    /// height bands.
    pub min_height: u32,
    /// Reduce the crop to the blue channel before OCR.
    pub blue_channel: bool,
    /// Binarization threshold applied after channel isolation.
    pub binarize: Option<u8>,
}

impl FieldSpec {
    const fn plain(field: ExtractField, rect: Rect) -> Self {
        Self { field, rect, multi: false, min_height: 0, blue_channel: false, binarize: None }
    }
}

/// Declarative field layout for one document kind/page. The extractor never
/// branches on the kind itself, only on what the map declares.
#[derive(Debug, Clone)]
pub struct CoordinateMap {
    pub name: &'static str,
    /// Region scanned for the drift-correction anchor token.
    pub anchor: Option<Rect>,
    pub fields: Vec<FieldSpec>,
}

/// Token searched for inside the anchor region. Its detected top-left,
/// relative to the region origin, becomes the drift offset.
pub const ANCHOR_TOKEN: &str = "ИНН";

/// Main delivery document (Type 1), first page.
pub fn primary_map() -> CoordinateMap {
    CoordinateMap {
        name: "primary",
        anchor: Some(Rect::new(0, 500, 500, 1000)),
        fields: vec![
            FieldSpec::plain(ExtractField::Date, Rect::new(880, 2520, 390, 140)),
            FieldSpec {
                field: ExtractField::DriverName,
                rect: Rect::new(850, 2450, 500, 150),
                multi: true,
                min_height: 20,
                blue_channel: true,
                binarize: Some(170),
            },
            FieldSpec::plain(ExtractField::Weight, Rect::new(1500, 1390, 300, 80)),
            FieldSpec {
                field: ExtractField::Brand,
                rect: Rect::new(380, 2730, 350, 70),
                multi: true,
                min_height: 38,
                blue_channel: true,
                binarize: None,
            },
            FieldSpec {
                field: ExtractField::Plate,
                rect: Rect::new(-80, 2730, 700, 170),
                multi: true,
                min_height: 38,
                blue_channel: true,
                binarize: Some(165),
            },
        ],
    }
}

/// Invoice document (Type 2), first page.
pub fn invoice_map() -> CoordinateMap {
    CoordinateMap {
        name: "invoice",
        anchor: None,
        fields: vec![
            FieldSpec::plain(ExtractField::Price, Rect::new(1450, 2150, 250, 160)),
            FieldSpec::plain(ExtractField::InvoiceNumber, Rect::new(500, 200, 500, 60)),
        ],
    }
}

/// Invoice second page — only consulted when the first-page price is suspect.
pub fn invoice_alt_price_map() -> CoordinateMap {
    CoordinateMap {
        name: "invoice_p2",
        anchor: None,
        fields: vec![FieldSpec::plain(ExtractField::PriceAlt, Rect::new(1500, 100, 150, 120))],
    }
}

/// Shipping note (Type 3), first page. Number and date share one region.
pub fn shipping_note_map() -> CoordinateMap {
    CoordinateMap {
        name: "shipping_note",
        anchor: None,
        fields: vec![
            FieldSpec::plain(ExtractField::NoteNumber, Rect::new(360, 250, 330, 200)),
            FieldSpec::plain(ExtractField::NoteDate, Rect::new(360, 250, 330, 200)),
        ],
    }
}

/// One recognized text region: text plus its bounding quadrilateral in crop
/// coordinates, ordered top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub text: String,
    pub quad: [(f32, f32); 4],
    pub confidence: f32,
}

impl TextFragment {
    /// Axis-aligned fragment covering `rect`-sized area at the origin.
    pub fn boxed(text: impl Into<String>, w: f32, h: f32) -> Self {
        Self {
            text: text.into(),
            quad: [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)],
            confidence: 1.0,
        }
    }

    /// Glyph height estimate: mean of the left and right edge vertical
    /// extents of the quadrilateral.
    pub fn height(&self) -> u32 {
        let left = self.quad[3].1 - self.quad[0].1;
        let right = self.quad[2].1 - self.quad[1].1;
        (((left + right) / 2.0).max(0.0)) as u32
    }

    pub fn top_left(&self) -> (i32, i32) {
        (self.quad[0].0 as i32, self.quad[0].1 as i32)
    }
}

/// Per-field OCR output: joined text for single-value fields, the raw
/// candidate list for the name/brand/plate fields.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Candidates(Vec<(String, u32)>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(t) => Some(t),
            FieldValue::Candidates(_) => None,
        }
    }

    pub fn as_candidates(&self) -> Option<&[(String, u32)]> {
        match self {
            FieldValue::Text(_) => None,
            FieldValue::Candidates(c) => Some(c),
        }
    }
}

/// Immutable result of extracting one (file, coordinate map) pair.
pub type ExtractionResult = HashMap<ExtractField, FieldValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_shift_clamps_to_non_negative() {
        let r = Rect::new(-80, 2730, 700, 170);
        let s = r.shifted(10, -3000);
        assert_eq!(s.x, 0);
        assert_eq!(s.y, 0);
        assert_eq!(s.w, 700);
    }

    #[test]
    fn fragment_height_averages_both_edges() {
        let f = TextFragment {
            text: "АБВ".into(),
            quad: [(0.0, 10.0), (50.0, 12.0), (50.0, 52.0), (0.0, 50.0)],
            confidence: 0.9,
        };
        // left edge 40, right edge 40 → 40
        assert_eq!(f.height(), 40);
    }

    #[test]
    fn primary_map_declares_anchor_and_multi_fields() {
        let map = primary_map();
        assert!(map.anchor.is_some());
        let multi: Vec<_> =
            map.fields.iter().filter(|f| f.multi).map(|f| f.field).collect();
        assert_eq!(
            multi,
            vec![ExtractField::DriverName, ExtractField::Brand, ExtractField::Plate]
        );
    }

    #[test]
    fn auxiliary_maps_have_no_anchor() {
        assert!(invoice_map().anchor.is_none());
        assert!(shipping_note_map().anchor.is_none());
    }

    #[test]
    fn binarize_thresholds_match_layouts() {
        let map = primary_map();
        let by_field = |f: ExtractField| map.fields.iter().find(|s| s.field == f).unwrap();
        assert_eq!(by_field(ExtractField::DriverName).binarize, Some(170));
        assert_eq!(by_field(ExtractField::Plate).binarize, Some(165));
        assert_eq!(by_field(ExtractField::Brand).binarize, None);
        assert!(by_field(ExtractField::Brand).blue_channel);
    }
}
