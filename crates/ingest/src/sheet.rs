//! Direct cell reads for spreadsheet-format primary documents. These
//! files carry the same fields a scanned primary does, at fixed cell
//! addresses, so no OCR pass is needed.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};

use freightscan_core::{FieldKey, Record};

use crate::cleaner::clean_plate_text;

/// Field values read from the fixed cell layout.
#[derive(Debug, Default)]
pub struct SheetFields {
    pub date: String,
    pub brand: String,
    /// Both plate cells cleaned and joined with `" / "`.
    pub plates: String,
    pub driver_name: String,
    pub weight_raw: String,
}

/// Cell origins recorded on the record for the preview screen. The
/// report date comes from the run configuration, not the sheet, so it
/// carries no cell origin.
const SOURCES: &[(FieldKey, &str)] = &[
    (FieldKey::Brand, "G89"),
    (FieldKey::Plate, "B89/B90"),
    (FieldKey::Driver, "M80"),
    (FieldKey::Weight, "U43"),
];

/// Read the known cells from the first worksheet. An unreadable file
/// degrades to empty fields rather than failing the run, matching how
/// an unreadable scan degrades to empty OCR output.
pub fn read_primary_sheet(path: &Path) -> SheetFields {
    let range = match load_first_sheet(path) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("cannot read spreadsheet {}: {e}", path.display());
            return SheetFields::default();
        }
    };

    let mut date = cell_text(&range, "K75");
    if date.is_empty() {
        date = cell_text(&range, "K76");
    }

    let plate_1 = clean_nonempty(&cell_text(&range, "B89"));
    let plate_2 = clean_nonempty(&cell_text(&range, "B90"));

    SheetFields {
        date,
        brand: cell_text(&range, "G89"),
        plates: format!("{plate_1} / {plate_2}"),
        driver_name: cell_text(&range, "M80"),
        weight_raw: cell_text(&range, "U43"),
    }
}

/// Record where each spreadsheet-sourced value came from.
pub fn annotate_sources(record: &mut Record) {
    for (key, origin) in SOURCES {
        record.add_source(*key, *origin);
    }
}

fn load_first_sheet(path: &Path) -> Result<Range<Data>, calamine::Error> {
    let mut wb = open_workbook_auto(path)?;
    let name = wb
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| calamine::Error::Msg("workbook has no sheets"))?;
    Ok(wb.worksheet_range(&name)?)
}

fn clean_nonempty(text: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        clean_plate_text(text)
    }
}

fn cell_text(range: &Range<Data>, cell_ref: &str) -> String {
    let Some((row, col)) = parse_cell_ref(cell_ref) else {
        return String::new();
    };
    match range.get_value((row, col)) {
        Some(Data::String(s)) => s.trim().to_string(),
        // Whole numbers print without a trailing ".0".
        Some(Data::Float(f)) if f.fract() == 0.0 && f.abs() < 1e15 => {
            format!("{}", *f as i64)
        }
        Some(Data::Float(f)) => f.to_string(),
        Some(Data::Int(i)) => i.to_string(),
        Some(Data::Bool(b)) => b.to_string(),
        Some(Data::DateTime(dt)) => dt.to_string(),
        Some(Data::DateTimeIso(s)) | Some(Data::DurationIso(s)) => s.trim().to_string(),
        Some(Data::Error(_)) | Some(Data::Empty) | None => String::new(),
    }
}

/// `"K75"` → zero-based (row, column).
fn parse_cell_ref(cell_ref: &str) -> Option<(u32, u32)> {
    let split = cell_ref.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell_ref.split_at(split);
    let mut col: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_uppercase() {
            return None;
        }
        col = col * 26 + (c as u32 - 'A' as u32 + 1);
    }
    let row: u32 = digits.parse().ok()?;
    if col == 0 || row == 0 {
        return None;
    }
    Some((row - 1, col - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_refs_parse_to_zero_based() {
        assert_eq!(parse_cell_ref("A1"), Some((0, 0)));
        assert_eq!(parse_cell_ref("K75"), Some((74, 10)));
        assert_eq!(parse_cell_ref("B90"), Some((89, 1)));
        assert_eq!(parse_cell_ref("U43"), Some((42, 20)));
        assert_eq!(parse_cell_ref("AA10"), Some((9, 26)));
        assert_eq!(parse_cell_ref("75"), None);
        assert_eq!(parse_cell_ref("k75"), None);
    }

    #[test]
    fn float_cells_lose_trailing_zero() {
        let mut range = Range::new((0, 0), (0, 1));
        range.set_value((0, 0), Data::Float(20000.0));
        range.set_value((0, 1), Data::Float(0.35));
        assert_eq!(cell_text(&range, "A1"), "20000");
        assert_eq!(cell_text(&range, "B1"), "0.35");
    }

    #[test]
    fn missing_cells_read_as_empty() {
        let range: Range<Data> = Range::new((0, 0), (0, 0));
        assert_eq!(cell_text(&range, "K75"), "");
    }

    #[test]
    fn unreadable_file_degrades_to_defaults() {
        let fields = read_primary_sheet(Path::new("/nonexistent/2.xlsx"));
        assert!(fields.date.is_empty());
        assert!(fields.plates.is_empty());
    }

    #[test]
    fn sources_cover_the_sheet_fields() {
        let mut r = Record::default();
        annotate_sources(&mut r);
        assert_eq!(r.sources.get(&3).map(String::as_str), Some("B89/B90"));
        assert_eq!(r.sources.get(&7).map(String::as_str), Some("U43"));
        assert!(!r.sources.contains_key(&1));
        assert_eq!(r.sources.len(), 4);
    }
}
