use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rust_decimal::Decimal;

use freightscan_ingest::{Pipeline, RunConfig, WorkDirs};
use freightscan_ocr::{OcrService, PopplerRasterizer};
use freightscan_rates::{NbkrRateSource, RateSource};
use freightscan_report::ReportBook;

/// Process an archive of scanned transport documents into a report.
#[derive(Parser)]
#[command(name = "freightscan", version, about)]
struct Cli {
    /// Zip archive with the primary, invoice (ESF) and shipping note
    /// (SNT) documents
    archive: PathBuf,

    /// Report date, DD.MM.YYYY (also the exchange-rate lookup date)
    #[arg(long)]
    date: String,

    /// Fixed USD exchange rate; skips the NBKR lookup
    #[arg(long)]
    rate: Option<Decimal>,

    /// TN VED commodity code written to every row
    #[arg(long, default_value = "")]
    tn_ved: String,

    /// BND code written to every row
    #[arg(long, default_value = "")]
    bnd: String,

    /// VAT percentage for the ЕАЭС column
    #[arg(long, default_value = "12")]
    vat_percent: Decimal,

    /// Existing report to append to
    #[arg(long)]
    report: Option<PathBuf>,

    /// Where to write the report
    #[arg(long, default_value = "report.xlsx")]
    out: PathBuf,

    /// Keep per-driver crop photos under <work-dir>/imgs/
    #[arg(long)]
    save_photos: bool,

    /// Root for scratch and image directories
    #[arg(long, default_value = "media")]
    work_dir: PathBuf,

    /// Print the processed records as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    // ── Exchange rate ─────────────────────────────────────────────────────────
    let rate = match cli.rate {
        Some(rate) => rate,
        None => NbkrRateSource::new()?
            .rate_for(&cli.date)
            .context("fetching the NBKR exchange rate")?,
    };
    tracing::info!("exchange rate for {}: {rate}", cli.date);

    // ── Pipeline ──────────────────────────────────────────────────────────────
    let dirs = WorkDirs::new(&cli.work_dir);
    let rasterizer = PopplerRasterizer::new(dirs.base.join("raster"));
    let ocr = build_ocr_service();
    if !ocr.is_available() {
        tracing::warn!("running without OCR: extracted fields will be empty");
    }

    let config = RunConfig {
        archive_name: cli
            .archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        report_date: cli.date.clone(),
        exchange_rate: rate,
        tn_ved_code: cli.tn_ved.clone(),
        bnd_code: cli.bnd.clone(),
        vat_percent: cli.vat_percent,
        save_photos: cli.save_photos,
    };

    let pipeline = Pipeline::new(&rasterizer, &ocr, dirs);
    let records = pipeline
        .process_archive(&cli.archive, &config)
        .context("processing the archive")?;

    for (i, record) in records.iter().enumerate() {
        tracing::info!(
            "record {}: driver '{}', plate '{}', errors: {}",
            i + 1,
            record.driver_name,
            record.plate_number,
            record.errors.len(),
        );
        for error in &record.errors {
            tracing::warn!("record {}: {error}", i + 1);
        }
    }

    if cli.json {
        let exported: Vec<_> = records.iter().map(|r| r.export()).collect();
        println!("{}", serde_json::to_string_pretty(&exported)?);
    }

    // ── Report ────────────────────────────────────────────────────────────────
    let mut book = match &cli.report {
        Some(existing) => ReportBook::load(existing, cli.vat_percent)
            .with_context(|| format!("loading existing report {}", existing.display()))?,
        None => ReportBook::new(cli.vat_percent),
    };
    for record in &records {
        book.append_record(record);
    }
    book.save(&cli.out)
        .with_context(|| format!("writing report {}", cli.out.display()))?;

    println!("Report written to {} ({} records)", cli.out.display(), records.len());
    Ok(())
}

#[cfg(feature = "tesseract")]
fn build_ocr_service() -> OcrService {
    use freightscan_ocr::recognizer::tesseract_backend::TesseractOcr;
    use freightscan_ocr::recognizer::OcrEngine;
    OcrService::new(
        TesseractOcr::new(None, "rus+eng").map(|t| Box::new(t) as Box<dyn OcrEngine>),
    )
}

#[cfg(not(feature = "tesseract"))]
fn build_ocr_service() -> OcrService {
    use freightscan_ocr::OcrError;
    OcrService::new(Err(OcrError::NotAvailable))
}
