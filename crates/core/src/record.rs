use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Report columns of a processed delivery record. The numeric values double
/// as the field keys of the export contract (`Record::export`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum FieldKey {
    Date = 1,
    Brand = 2,
    Plate = 3,
    Driver = 4,
    TnVed = 5,
    Bnd = 6,
    Weight = 7,
    Price = 8,
    UsdSum = 9,
    Rate = 10,
    LocalSum = 11,
    Vat = 12,
    NoteDate = 13,
    Waybill = 14,
    NoteNumber = 15,
    InvoiceNumber = 16,
    RawDebug = 17,
    PlateDebug = 18,
}

impl FieldKey {
    pub fn key(self) -> u8 {
        self as u8
    }
}

/// One row of the output report, anchored by a single primary document.
///
/// Replaces the original integer-keyed row dictionary with named fields;
/// the numeric contract is restored only at the serialization boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    /// Report date as entered for the run (`DD.MM.YYYY`).
    pub date: String,
    pub vehicle_brand: String,
    pub plate_number: String,
    pub driver_name: String,
    pub tn_ved_code: String,
    pub bnd_code: String,
    /// Weight text as extracted (kilograms), before decimal coercion.
    pub weight_raw: String,
    /// Weight in tons, set by the financial calculator.
    pub weight_tons: Option<Decimal>,
    /// Price text as extracted from the invoice.
    pub price_raw: Option<String>,
    pub unit_price: Option<Decimal>,
    pub usd_sum: Option<Decimal>,
    pub exchange_rate: Decimal,
    pub local_sum: Option<Decimal>,
    pub vat_amount: Option<Decimal>,
    pub shipping_note_date: Option<String>,
    /// CMR number derived from the primary document's filename.
    pub waybill_code: String,
    pub shipping_note_number: Option<String>,
    pub invoice_number: Option<String>,
    /// Raw OCR dump of the brand/plate regions, for the preview screen.
    pub raw_debug: String,
    /// Height-filtered plate candidates, for the preview screen.
    pub plate_debug: String,

    pub preview_images: Vec<String>,
    pub field_images: BTreeMap<u8, Vec<String>>,
    /// Human-readable value origins (cell addresses) for spreadsheet-sourced
    /// primaries, keyed like `field_images`.
    pub sources: BTreeMap<u8, String>,
    /// User-facing diagnostics, in the order they occurred.
    pub errors: Vec<String>,
}

impl Record {
    /// Both auxiliary documents linked. Incomplete records are candidates for
    /// the force-link reconciliation pass.
    pub fn is_complete(&self) -> bool {
        self.invoice_number.is_some() && self.shipping_note_number.is_some()
    }

    pub fn add_field_image(&mut self, key: FieldKey, path: impl Into<String>) {
        self.field_images.entry(key.key()).or_default().push(path.into());
    }

    pub fn add_source(&mut self, key: FieldKey, origin: impl Into<String>) {
        self.sources.insert(key.key(), origin.into());
    }

    /// Serialize to the numeric-key map consumed by the presentation layer:
    /// field keys `"1"`–`"18"` plus `preview_images`, `field_images`,
    /// `sources` and `errors`.
    pub fn export(&self) -> Value {
        fn dec(v: &Option<Decimal>) -> Value {
            v.map_or(Value::Null, |d| json!(d.to_string()))
        }
        fn opt(v: &Option<String>) -> Value {
            v.as_deref().map_or(Value::Null, |s| json!(s))
        }

        let mut map = Map::new();
        map.insert("1".into(), json!(self.date));
        map.insert("2".into(), json!(self.vehicle_brand));
        map.insert("3".into(), json!(self.plate_number));
        map.insert("4".into(), json!(self.driver_name));
        map.insert("5".into(), json!(self.tn_ved_code));
        map.insert("6".into(), json!(self.bnd_code));
        map.insert(
            "7".into(),
            self.weight_tons
                .map_or_else(|| json!(self.weight_raw), |d| json!(d.to_string())),
        );
        map.insert(
            "8".into(),
            self.unit_price
                .map_or_else(|| opt(&self.price_raw), |d| json!(d.to_string())),
        );
        map.insert("9".into(), dec(&self.usd_sum));
        map.insert("10".into(), json!(self.exchange_rate.to_string()));
        map.insert("11".into(), dec(&self.local_sum));
        map.insert("12".into(), dec(&self.vat_amount));
        map.insert("13".into(), opt(&self.shipping_note_date));
        map.insert("14".into(), json!(self.waybill_code));
        map.insert("15".into(), opt(&self.shipping_note_number));
        map.insert("16".into(), opt(&self.invoice_number));
        map.insert("17".into(), json!(self.raw_debug));
        map.insert("18".into(), json!(self.plate_debug));
        map.insert("preview_images".into(), json!(self.preview_images));
        map.insert("field_images".into(), json!(self.field_images));
        map.insert("sources".into(), json!(self.sources));
        map.insert("errors".into(), json!(self.errors));
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn export_uses_numeric_keys() {
        let mut r = Record {
            date: "15.01.2026".into(),
            driver_name: "Абдыкадыров У.".into(),
            exchange_rate: Decimal::from_str("89.25").unwrap(),
            usd_sum: Some(Decimal::from_str("7.00").unwrap()),
            ..Record::default()
        };
        r.add_field_image(FieldKey::Driver, "imgs/fio.png");
        r.errors.push("invoice document not found".into());

        let v = r.export();
        assert_eq!(v["1"], "15.01.2026");
        assert_eq!(v["4"], "Абдыкадыров У.");
        assert_eq!(v["9"], "7.00");
        assert_eq!(v["10"], "89.25");
        assert!(v["8"].is_null());
        assert_eq!(v["field_images"]["4"][0], "imgs/fio.png");
        assert_eq!(v["errors"][0], "invoice document not found");
    }

    #[test]
    fn export_prefers_computed_weight_over_raw() {
        let mut r = Record { weight_raw: "20000".into(), ..Record::default() };
        assert_eq!(r.export()["7"], "20000");
        r.weight_tons = Some(Decimal::from_str("20.00").unwrap());
        assert_eq!(r.export()["7"], "20.00");
    }

    #[test]
    fn completeness_requires_both_documents() {
        let mut r = Record::default();
        assert!(!r.is_complete());
        r.invoice_number = Some("ЭСФ-1".into());
        assert!(!r.is_complete());
        r.shipping_note_number = Some("KZ-SNT-123".into());
        assert!(r.is_complete());
    }

    #[test]
    fn field_key_values_match_export_contract() {
        assert_eq!(FieldKey::Date.key(), 1);
        assert_eq!(FieldKey::Weight.key(), 7);
        assert_eq!(FieldKey::NoteNumber.key(), 15);
        assert_eq!(FieldKey::PlateDebug.key(), 18);
    }
}
