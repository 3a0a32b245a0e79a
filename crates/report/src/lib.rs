//! Report workbook assembly.
//!
//! Records land in a 16-column sheet with live formulas for the
//! derived sums, date-typed cells, and the fill colors the operators
//! expect. Appending to an existing report reads the old rows back and
//! rewrites the whole workbook; legacy tables and auto-filters do not
//! survive the rewrite, which is deliberate. An existing report whose
//! first column is a row-number column (header cell carrying anything
//! but a date label) keeps its numbering, continued from the highest
//! number present.

use std::io;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Color, ExcelDateTime, Format, Formula, Workbook, Worksheet};
use thiserror::Error;

use freightscan_core::Record;

pub const SHEET_NAME: &str = "OCR Results";

pub const REPORT_HEADERS: [&str; 16] = [
    "Дата",
    "Марка АТС",
    "Гос.номер АТС",
    "ФИО Водит.",
    "Код ТН ВЭД",
    "БНД",
    "Кол.тон",
    "Цена",
    "Сумма в $",
    "Курс",
    "Сумма в сомах",
    "НДС ЕАЭС",
    "Дата сопр.накл",
    "Номер СМР",
    "№ сопров.накл. KZ",
    "№ счет факт",
];

const FILL_LIGHT_GREEN: Color = Color::RGB(0x92D050);
const FILL_DARK_GREEN: Color = Color::RGB(0x00B050);
const NUM_FORMAT: &str = "#,##0.00";
const DATE_FORMAT: &str = "DD.MM.YYYY";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot read existing report: {0}")]
    Read(#[from] calamine::Error),
    #[error("cannot write report: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A cell carried over from an existing report.
#[derive(Debug, Clone)]
enum Carried {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Excel serial date-time.
    Serial(f64),
}

/// Accumulates rows and writes the final workbook.
#[derive(Debug)]
pub struct ReportBook {
    sheet_name: String,
    headers: Vec<String>,
    carried: Vec<Vec<Carried>>,
    has_numbering: bool,
    next_number: i64,
    records: Vec<Record>,
    vat_percent: Decimal,
}

impl ReportBook {
    /// A fresh report with the standard header row.
    pub fn new(vat_percent: Decimal) -> Self {
        Self {
            sheet_name: SHEET_NAME.to_string(),
            headers: REPORT_HEADERS.iter().map(|h| h.to_string()).collect(),
            carried: Vec::new(),
            has_numbering: false,
            next_number: 1,
            records: Vec::new(),
            vat_percent,
        }
    }

    /// Load an existing report to append to. Every existing row is
    /// carried into the rewrite; cached formula values replace the
    /// formulas themselves.
    pub fn load(path: &Path, vat_percent: Decimal) -> Result<Self, ReportError> {
        let mut wb = open_workbook_auto(path)?;
        let sheet_name = wb
            .sheet_names()
            .first()
            .cloned()
            .unwrap_or_else(|| SHEET_NAME.to_string());
        let range = wb.worksheet_range(&sheet_name)?;

        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .map(|r| r.iter().map(data_to_string).collect())
            .unwrap_or_default();
        let carried: Vec<Vec<Carried>> =
            rows.map(|r| r.iter().map(carry).collect()).collect();

        let has_numbering = headers
            .first()
            .is_some_and(|h| !h.is_empty() && !h.to_lowercase().contains("дата"));
        let next_number = if has_numbering {
            tracing::info!("numbering column detected, header: '{}'", headers[0]);
            max_row_number(&carried) + 1
        } else {
            1
        };

        Ok(Self {
            sheet_name,
            headers,
            carried,
            has_numbering,
            next_number,
            records: Vec::new(),
            vat_percent,
        })
    }

    pub fn append_record(&mut self, record: &Record) {
        self.records.push(record.clone());
    }

    /// Write the workbook out.
    pub fn save(&self, path: &Path) -> Result<(), ReportError> {
        let mut workbook = Workbook::new();
        let ws = workbook.add_worksheet();
        ws.set_name(&self.sheet_name)?;

        let off: u16 = if self.has_numbering { 1 } else { 0 };
        let bold = Format::new().set_bold();
        let numeric = Format::new().set_num_format(NUM_FORMAT);

        for (col, header) in self.headers.iter().enumerate() {
            ws.write_string_with_format(0, col as u16, header, &bold)?;
        }

        let numeric_cols: Vec<u16> = (6..12).map(|c| c + off).collect();
        for (i, row) in self.carried.iter().enumerate() {
            let r = (i + 1) as u32;
            for (col, cell) in row.iter().enumerate() {
                let col = col as u16;
                write_carried(ws, r, col, cell, numeric_cols.contains(&col), &numeric)?;
            }
        }

        let mut row = self.carried.len() as u32 + 1;
        let mut number = self.next_number;
        for record in &self.records {
            self.write_record(ws, row, off, number, record)?;
            row += 1;
            number += 1;
        }

        workbook.save(path)?;
        Ok(())
    }

    fn write_record(
        &self,
        ws: &mut Worksheet,
        row: u32,
        off: u16,
        number: i64,
        record: &Record,
    ) -> Result<(), ReportError> {
        let numeric = Format::new().set_num_format(NUM_FORMAT);
        let date_light = Format::new()
            .set_num_format(DATE_FORMAT)
            .set_background_color(FILL_LIGHT_GREEN);
        let text_light = Format::new().set_background_color(FILL_LIGHT_GREEN);
        let numeric_light = Format::new()
            .set_num_format(NUM_FORMAT)
            .set_background_color(FILL_LIGHT_GREEN);
        let numeric_dark = Format::new()
            .set_num_format(NUM_FORMAT)
            .set_background_color(FILL_DARK_GREEN);
        let date_plain = Format::new().set_num_format(DATE_FORMAT);
        let int_plain = Format::new().set_num_format("0");

        if off == 1 {
            ws.write_number(row, 0, number as f64)?;
        }

        // 1: report date, light green, typed as a date when parseable
        write_date_cell(ws, row, off, &record.date, &date_light, Some(&text_light))?;

        ws.write_string(row, off + 1, &record.vehicle_brand)?;
        ws.write_string(row, off + 2, &record.plate_number)?;
        ws.write_string(row, off + 3, &record.driver_name)?;
        write_int_cell(ws, row, off + 4, &record.tn_ved_code, &int_plain)?;
        ws.write_string(row, off + 5, &record.bnd_code)?;

        // 7: weight in tons, dark green
        if let Some(w) = record.weight_tons.and_then(|d| d.to_f64()) {
            ws.write_number_with_format(row, off + 6, w, &numeric_dark)?;
        } else {
            ws.write_string_with_format(row, off + 6, &record.weight_raw, &numeric_dark)?;
        }

        // 8: unit price
        if let Some(p) = record.unit_price.and_then(|d| d.to_f64()) {
            ws.write_number_with_format(row, off + 7, p, &numeric)?;
        } else if let Some(raw) = &record.price_raw {
            ws.write_string_with_format(row, off + 7, raw, &numeric)?;
        }

        // 9, 11, 12: live formulas over the row's own cells
        let excel_row = row + 1;
        let (usd, som, vat) = row_formulas(excel_row, off, self.vat_percent);
        ws.write_formula_with_format(row, off + 8, Formula::new(usd), &numeric)?;

        // 10: exchange rate, light green
        if let Some(rate) = record.exchange_rate.to_f64() {
            ws.write_number_with_format(row, off + 9, rate, &numeric_light)?;
        }

        ws.write_formula_with_format(row, off + 10, Formula::new(som), &numeric)?;
        ws.write_formula_with_format(row, off + 11, Formula::new(vat), &numeric)?;

        // 13: shipping note date, typed when parseable
        if let Some(note_date) = &record.shipping_note_date {
            write_date_cell(ws, row, off + 12, note_date, &date_plain, None)?;
        }

        write_int_cell(ws, row, off + 13, &record.waybill_code, &int_plain)?;
        if let Some(num) = &record.shipping_note_number {
            ws.write_string(row, off + 14, num)?;
        }
        if let Some(num) = &record.invoice_number {
            ws.write_string(row, off + 15, num)?;
        }
        Ok(())
    }
}

/// The three computed columns as formulas, referencing the row itself:
/// usd = tons × price, local = usd × rate, vat = local × pct%.
fn row_formulas(excel_row: u32, off: u16, vat_percent: Decimal) -> (String, String, String) {
    let tons = col_letter(off + 6);
    let price = col_letter(off + 7);
    let usd = col_letter(off + 8);
    let rate = col_letter(off + 9);
    let som = col_letter(off + 10);
    (
        format!("={tons}{excel_row}*{price}{excel_row}"),
        format!("={usd}{excel_row}*{rate}{excel_row}"),
        format!("={som}{excel_row}*{vat_percent}%"),
    )
}

/// Zero-based column index to its Excel letter name.
fn col_letter(col: u16) -> String {
    let mut n = col as u32 + 1;
    let mut name = String::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        name.insert(0, (b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    name
}

/// Write a `DD.MM.YYYY` string as a real date cell when it parses,
/// else as plain text (with the fallback format when given).
fn write_date_cell(
    ws: &mut Worksheet,
    row: u32,
    col: u16,
    value: &str,
    date_format: &Format,
    text_format: Option<&Format>,
) -> Result<(), ReportError> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%d.%m.%Y") {
        use chrono::Datelike;
        let dt = ExcelDateTime::from_ymd(
            date.year() as u16,
            date.month() as u8,
            date.day() as u8,
        )?;
        ws.write_datetime_with_format(row, col, &dt, date_format)?;
    } else if let Some(format) = text_format {
        ws.write_string_with_format(row, col, value, format)?;
    } else {
        ws.write_string(row, col, value)?;
    }
    Ok(())
}

/// Digit-only strings become integer cells; anything else stays text.
fn write_int_cell(
    ws: &mut Worksheet,
    row: u32,
    col: u16,
    value: &str,
    int_format: &Format,
) -> Result<(), ReportError> {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(n) = value.parse::<i64>() {
            ws.write_number_with_format(row, col, n as f64, int_format)?;
            return Ok(());
        }
    }
    if !value.is_empty() {
        ws.write_string(row, col, value)?;
    }
    Ok(())
}

fn write_carried(
    ws: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &Carried,
    numeric_col: bool,
    numeric: &Format,
) -> Result<(), ReportError> {
    match cell {
        Carried::Empty => {}
        Carried::Text(s) => {
            ws.write_string(row, col, s)?;
        }
        Carried::Number(n) if numeric_col => {
            ws.write_number_with_format(row, col, *n, numeric)?;
        }
        Carried::Number(n) => {
            ws.write_number(row, col, *n)?;
        }
        Carried::Bool(b) => {
            ws.write_boolean(row, col, *b)?;
        }
        Carried::Serial(serial) => {
            let dt = ExcelDateTime::from_serial_datetime(*serial)?;
            let format = Format::new().set_num_format(DATE_FORMAT);
            ws.write_datetime_with_format(row, col, &dt, &format)?;
        }
    }
    Ok(())
}

fn carry(data: &Data) -> Carried {
    match data {
        Data::Empty | Data::Error(_) => Carried::Empty,
        Data::String(s) => Carried::Text(s.clone()),
        Data::Float(f) => Carried::Number(*f),
        Data::Int(i) => Carried::Number(*i as f64),
        Data::Bool(b) => Carried::Bool(*b),
        Data::DateTime(dt) => Carried::Serial(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Carried::Text(s.clone()),
    }
}

fn data_to_string(data: &Data) -> String {
    match data {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

/// Highest integer in the first column of the carried rows.
fn max_row_number(carried: &[Vec<Carried>]) -> i64 {
    carried
        .iter()
        .filter_map(|row| row.first())
        .filter_map(|cell| match cell {
            Carried::Number(n) => Some(*n as i64),
            Carried::Text(s) => s.trim().parse().ok(),
            _ => None,
        })
        .max()
        .unwrap_or(0)
}
