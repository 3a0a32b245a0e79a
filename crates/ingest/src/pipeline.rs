//! End-to-end archive processing: extract, classify, read every
//! primary document into a [`Record`], link auxiliary documents by
//! surname, and derive the financial chain.

use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;

use freightscan_core::{
    compute_totals, recompute_after_link, safe_decimal, FieldKey, Record, RunError,
};
use freightscan_ocr::{
    invoice_alt_price_map, invoice_map, primary_map, shipping_note_map, ExtractField, Extraction,
    Extractor, OcrService, PageRasterizer,
};

use crate::archive::{self, WorkDirs};
use crate::classifier::{self, DocKind};
use crate::cleaner::{self, DateContext};
use crate::matcher::{reconcile, MatchPool, Reconciliation};
use crate::sheet;
use crate::surname::surname_variants;

const MISSING_INVOICE: &str = "Invoice (ESF) document not found for this driver.";
const MISSING_NOTE: &str = "Shipping note (SNT) document not found for this driver.";
const MISSING_INVOICE_NUMBER: &str = "Invoice number could not be read. Check the ESF file.";
const MISSING_NOTE_NUMBER: &str =
    "Shipping note number (KZ-SNT) could not be read. Check the SNT file.";
const MISSING_NOTE_DATE: &str = "Shipping note date could not be read. Check the SNT file.";

/// Per-run parameters entered by the operator.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Name of the uploaded archive (date fallback source).
    pub archive_name: String,
    /// Report date, `DD.MM.YYYY`.
    pub report_date: String,
    pub exchange_rate: Decimal,
    pub tn_ved_code: String,
    pub bnd_code: String,
    pub vat_percent: Decimal,
    /// Retain per-driver crop photos outside the scratch tree.
    pub save_photos: bool,
}

pub struct Pipeline<'a> {
    extractor: Extractor<'a>,
    dirs: WorkDirs,
}

impl<'a> Pipeline<'a> {
    pub fn new(rasterizer: &'a dyn PageRasterizer, ocr: &'a OcrService, dirs: WorkDirs) -> Self {
        Self { extractor: Extractor::new(rasterizer, ocr), dirs }
    }

    /// Process one uploaded archive into report records.
    pub fn process_archive(
        &self,
        archive_path: &Path,
        config: &RunConfig,
    ) -> Result<Vec<Record>, RunError> {
        self.dirs.prepare()?;
        let staged = self.dirs.upload.join("upload.zip");
        fs::copy(archive_path, &staged)?;
        archive::extract_zip(&staged, &self.dirs.extracted)?;

        let files = archive::walk_files(&self.dirs.extracted)?;
        let classified = classifier::classify(&files)?;
        tracing::info!(
            "classified {} primaries, {} invoices, {} shipping notes",
            classified.primaries.len(),
            classified.invoices.len(),
            classified.shipping_notes.len(),
        );

        let aux_files: Vec<PathBuf> = classified
            .invoices
            .iter()
            .chain(&classified.shipping_notes)
            .cloned()
            .collect();

        let mut records = Vec::new();
        let mut folders = Vec::new();
        for (idx, primary) in classified.primaries.iter().enumerate() {
            let (record, folder) = self.process_primary(idx, primary, &aux_files, config);
            records.push(record);
            folders.push(folder);
        }

        let invoices = MatchPool::new(classified.invoices.clone());
        let notes = MatchPool::new(classified.shipping_notes.clone());
        link_documents(&mut records, invoices, notes, config, |record, idx, path, kind| {
            self.apply_document(record, idx, &folders[idx], path, kind, &aux_files, config);
        })?;

        Ok(records)
    }

    /// Build the record anchored by one primary document. Returns the
    /// record plus the date-derived folder name used for retained
    /// photos.
    fn process_primary(
        &self,
        idx: usize,
        path: &Path,
        aux_files: &[PathBuf],
        config: &RunConfig,
    ) -> (Record, String) {
        tracing::info!("processing primary document: {}", path.display());
        let mut record = Record {
            date: config.report_date.clone(),
            tn_ved_code: config.tn_ved_code.clone(),
            bnd_code: config.bnd_code.clone(),
            exchange_rate: config.exchange_rate,
            waybill_code: cleaner::clean_waybill(path),
            ..Record::default()
        };

        let is_sheet = classifier::is_spreadsheet(path);
        let raw_date;
        if is_sheet {
            let fields = sheet::read_primary_sheet(path);
            record.driver_name = fields.driver_name;
            record.vehicle_brand = fields.brand;
            record.plate_number = fields.plates;
            record.weight_raw = cleaner::clean_weight(&fields.weight_raw);
            sheet::annotate_sources(&mut record);
            raw_date = fields.date;
        } else {
            let preview_dir = self.dirs.preview_dir(idx);
            let extraction = self.extractor.extract(path, &primary_map(), &preview_dir, true, 0);

            record.driver_name =
                cleaner::clean_driver_name(extraction.candidates(ExtractField::DriverName));

            let brand_raw = extraction.candidates(ExtractField::Brand);
            record.vehicle_brand = brand_raw
                .iter()
                .map(|(t, _)| t.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");

            let plate_raw = extraction.candidates(ExtractField::Plate);
            record.plate_number = cleaner::join_plate_pair(plate_raw);
            record.plate_debug = plate_raw
                .iter()
                .filter(|(_, h)| *h > 35 && *h < 46)
                .map(|(t, h)| format!("{t} (H: {h})"))
                .collect::<Vec<_>>()
                .join(" | ");
            record.raw_debug = raw_debug(brand_raw, plate_raw);

            record.weight_raw =
                cleaner::clean_weight(extraction.text(ExtractField::Weight).unwrap_or(""));
            raw_date = extraction.text(ExtractField::Date).unwrap_or("").to_string();

            self.collect_images(&mut record, &extraction, &preview_dir);
        }

        let surname = surname_of(&record).to_string();
        let ctx = DateContext {
            surname: &surname,
            archive_name: &config.archive_name,
            aux_files,
        };
        let mut date_clean = cleaner::clean_date(&raw_date, &ctx);
        if date_clean.is_empty() {
            date_clean = "Unknown_Date".to_string();
        }
        let folder = date_clean.replace(['/', '\\'], "-");

        if config.save_photos && !is_sheet {
            let sname = if surname.is_empty() { "Unknown" } else { &surname };
            copy_crops(&self.dirs.preview_dir(idx), &self.dirs.person_dir(&folder, sname), "");
        }

        (record, folder)
    }

    /// Extract a matched auxiliary document into the record.
    #[allow(clippy::too_many_arguments)]
    fn apply_document(
        &self,
        record: &mut Record,
        idx: usize,
        folder: &str,
        path: &Path,
        kind: DocKind,
        aux_files: &[PathBuf],
        config: &RunConfig,
    ) {
        let (subdir, prefix) = match kind {
            DocKind::Invoice => ("type2", "type2_"),
            DocKind::ShippingNote => ("type3", "type3_"),
            DocKind::Primary => return,
        };
        let dir = self.dirs.preview_dir(idx).join(subdir);

        match kind {
            DocKind::Invoice => {
                let extraction = self.extractor.extract(path, &invoice_map(), &dir, false, 0);

                let mut price =
                    cleaner::replace_ruble(extraction.text(ExtractField::Price).unwrap_or(""));
                let check = safe_decimal(&price);
                if check == Decimal::from(7) || check <= Decimal::ONE {
                    tracing::info!("price '{price}' is implausible, reading the second page");
                    let alt =
                        self.extractor.extract(path, &invoice_alt_price_map(), &dir, false, 1);
                    for (field, img) in &alt.images {
                        record.add_field_image(field_key(*field), self.dirs.relative(img));
                    }
                    if let Some(alt_text) =
                        alt.text(ExtractField::PriceAlt).filter(|t| !t.is_empty())
                    {
                        price = cleaner::replace_ruble(alt_text);
                    }
                }
                record.price_raw = Some(price);

                let number = cleaner::replace_ruble(
                    extraction.text(ExtractField::InvoiceNumber).unwrap_or(""),
                );
                record.invoice_number = (!number.is_empty()).then_some(number);

                self.collect_images(record, &extraction, &dir);
            }
            DocKind::ShippingNote => {
                let extraction =
                    self.extractor.extract(path, &shipping_note_map(), &dir, false, 0);

                let number = cleaner::clean_note_number(
                    extraction.text(ExtractField::NoteNumber).unwrap_or(""),
                );
                record.shipping_note_number = (!number.is_empty()).then_some(number);

                let surname = surname_of(record).to_string();
                let ctx = DateContext {
                    surname: &surname,
                    archive_name: &config.archive_name,
                    aux_files,
                };
                let date =
                    cleaner::clean_date(extraction.text(ExtractField::NoteDate).unwrap_or(""), &ctx);
                record.shipping_note_date = (!date.is_empty()).then_some(date);

                self.collect_images(record, &extraction, &dir);
            }
            DocKind::Primary => {}
        }

        if config.save_photos {
            let surname = surname_of(record).to_string();
            let sname = if surname.is_empty() { "Unknown" } else { &surname };
            copy_crops(&dir, &self.dirs.person_dir(folder, sname), prefix);
        }
    }

    /// Register crop images on the record: field-keyed images from the
    /// extraction itself, plus every file in the crop directory (the
    /// anchor crop included) for the preview strip.
    fn collect_images(&self, record: &mut Record, extraction: &Extraction, dir: &Path) {
        for (field, img) in &extraction.images {
            record.add_field_image(field_key(*field), self.dirs.relative(img));
        }
        if let Ok(files) = archive::walk_files(dir) {
            for file in files {
                record.preview_images.push(self.dirs.relative(&file));
            }
        }
    }
}

/// Link auxiliary documents to records and derive the financial chain.
///
/// `apply` transfers one matched document's data onto the record; the
/// pipeline passes an OCR-extracting closure, tests can pass direct
/// setters. Records without a readable surname skip matching entirely
/// and report no missing-document errors.
pub fn link_documents<F>(
    records: &mut [Record],
    mut invoices: MatchPool,
    mut notes: MatchPool,
    config: &RunConfig,
    mut apply: F,
) -> Result<(), RunError>
where
    F: FnMut(&mut Record, usize, &Path, DocKind),
{
    for (idx, record) in records.iter_mut().enumerate() {
        let variants = surname_variants(surname_of(record));
        if variants.is_empty() {
            tracing::warn!("record {idx}: no surname extracted, skipping document matching");
        } else {
            match invoices.take(&variants) {
                Some(path) => {
                    apply(record, idx, &path, DocKind::Invoice);
                    if record.invoice_number.is_none() {
                        record.errors.push(MISSING_INVOICE_NUMBER.to_string());
                    }
                }
                None => record.errors.push(MISSING_INVOICE.to_string()),
            }
            match notes.take(&variants) {
                Some(path) => {
                    apply(record, idx, &path, DocKind::ShippingNote);
                    if record.shipping_note_number.is_none() {
                        record.errors.push(MISSING_NOTE_NUMBER.to_string());
                    }
                    if record.shipping_note_date.is_none() {
                        record.errors.push(MISSING_NOTE_DATE.to_string());
                    }
                }
                None => record.errors.push(MISSING_NOTE.to_string()),
            }
        }
        compute_totals(record, config.exchange_rate, config.vat_percent);
    }

    match reconcile(records, &invoices, &notes) {
        Reconciliation::Clean => Ok(()),
        Reconciliation::ForceLink { record_idx, invoice, note } => {
            tracing::info!(
                "force-linking leftover documents to record {record_idx}: {} + {}",
                invoice.display(),
                note.display(),
            );
            let record = &mut records[record_idx];
            apply(record, record_idx, &invoice, DocKind::Invoice);
            apply(record, record_idx, &note, DocKind::ShippingNote);
            record
                .errors
                .retain(|e| !e.contains("not found") && !e.contains("could not be read"));
            recompute_after_link(record, config.exchange_rate, config.vat_percent);
            Ok(())
        }
        Reconciliation::Unresolved { diagnostic } => {
            Err(RunError::UnresolvedDocuments { diagnostic })
        }
    }
}

/// Surname key for matching: first whitespace-delimited token of the
/// driver name.
fn surname_of(record: &Record) -> &str {
    record.driver_name.split_whitespace().next().unwrap_or("")
}

fn field_key(field: ExtractField) -> FieldKey {
    match field {
        ExtractField::Date => FieldKey::Date,
        ExtractField::DriverName => FieldKey::Driver,
        ExtractField::Weight => FieldKey::Weight,
        ExtractField::Brand => FieldKey::Brand,
        ExtractField::Plate => FieldKey::Plate,
        ExtractField::Price | ExtractField::PriceAlt => FieldKey::Price,
        ExtractField::InvoiceNumber => FieldKey::InvoiceNumber,
        ExtractField::NoteNumber => FieldKey::NoteNumber,
        ExtractField::NoteDate => FieldKey::NoteDate,
    }
}

fn raw_debug(brand_raw: &[(String, u32)], plate_raw: &[(String, u32)]) -> String {
    let mut parts = Vec::new();
    if !brand_raw.is_empty() {
        let brand: Vec<&str> = brand_raw.iter().map(|(t, _)| t.as_str()).collect();
        parts.push(format!("Brand: {}", brand.join(" ")));
    }
    if !plate_raw.is_empty() {
        let plate: Vec<String> =
            plate_raw.iter().map(|(t, h)| format!("{t} (H: {h})")).collect();
        parts.push(format!("Plate: {}", plate.join(" | ")));
    }
    parts.join(" | ")
}

/// Copy every file of `src` into `dst` under a kind prefix. Retained
/// photos are best-effort: failures are logged, never fatal.
fn copy_crops(src: &Path, dst: &Path, prefix: &str) {
    if !src.exists() {
        return;
    }
    if let Err(e) = fs::create_dir_all(dst) {
        tracing::warn!("cannot create {}: {e}", dst.display());
        return;
    }
    let entries = match fs::read_dir(src) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("cannot read {}: {e}", src.display());
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name();
        let target = dst.join(format!("{prefix}{}", name.to_string_lossy()));
        if let Err(e) = fs::copy(&path, &target) {
            tracing::warn!("cannot copy {} to {}: {e}", path.display(), target.display());
        }
    }
}
