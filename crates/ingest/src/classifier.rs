use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use freightscan_core::RunError;

/// The three recognized document kinds. Anything else in the archive is
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    Primary,
    Invoice,
    ShippingNote,
}

/// One filename rule. Rules are tried in order; the first hit wins.
struct Rule {
    pattern: Regex,
    /// Extension the file must carry for the rule to apply (the pattern
    /// itself covers the extension when this is `None`).
    requires_ext: Option<&'static str>,
    kind: DocKind,
}

fn rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            // Main documents: digits/dots, optional CMR suffix token, PDF or XLSX.
            Rule {
                pattern: Regex::new(r"(?i)^[\d.]+(\s*(cmp|смп|смр|cmr))?\s*\.(pdf|xlsx)$")
                    .expect("invalid regex"),
                requires_ext: None,
                kind: DocKind::Primary,
            },
            // Invoices (ESF): keyword-prefixed PDFs.
            Rule {
                pattern: Regex::new(r"(?i)^(эсф|электронный\s*-?\s*счет\s*-?\s*фактура)")
                    .expect("invalid regex"),
                requires_ext: Some("pdf"),
                kind: DocKind::Invoice,
            },
            // Shipping notes (SNT): keyword-prefixed PDFs.
            Rule {
                pattern: Regex::new(r"(?i)^(снт|сопроводительная\s*накладная\s*(на)?\s*товары)")
                    .expect("invalid regex"),
                requires_ext: Some("pdf"),
                kind: DocKind::ShippingNote,
            },
        ]
    })
}

/// Classify a bare filename against the rule table.
pub fn classify_name(name: &str) -> Option<DocKind> {
    let lower = name.to_lowercase();
    for rule in rules() {
        if let Some(ext) = rule.requires_ext {
            if !lower.ends_with(&format!(".{ext}")) {
                continue;
            }
        }
        if rule.pattern.is_match(&lower) {
            return Some(rule.kind);
        }
    }
    None
}

/// Archive file list bucketed by kind, in archive order.
#[derive(Debug, Default)]
pub struct ClassifiedFiles {
    pub primaries: Vec<PathBuf>,
    pub invoices: Vec<PathBuf>,
    pub shipping_notes: Vec<PathBuf>,
}

/// Bucket every file of an extracted archive. Zero primary documents is
/// fatal: there is nothing to anchor matching against.
pub fn classify(files: &[PathBuf]) -> Result<ClassifiedFiles, RunError> {
    let mut out = ClassifiedFiles::default();
    for path in files {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match classify_name(name) {
            Some(DocKind::Primary) => {
                tracing::info!("classified as primary: {name}");
                out.primaries.push(path.clone());
            }
            Some(DocKind::Invoice) => {
                tracing::info!("classified as invoice: {name}");
                out.invoices.push(path.clone());
            }
            Some(DocKind::ShippingNote) => {
                tracing::info!("classified as shipping note: {name}");
                out.shipping_notes.push(path.clone());
            }
            None => tracing::debug!("ignored: {name}"),
        }
    }
    if out.primaries.is_empty() {
        return Err(RunError::NoPrimaryDocuments);
    }
    Ok(out)
}

/// Whether a primary document is in spreadsheet format.
pub fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Filename → kind fixtures, enumerable thanks to the rule table.
    #[test]
    fn primary_filenames() {
        for name in ["1.pdf", "2.xlsx", "12.pdf", "1.2.pdf", "3 CMP.pdf", "4 смр .pdf", "5cmr.pdf"] {
            assert_eq!(classify_name(name), Some(DocKind::Primary), "{name}");
        }
    }

    #[test]
    fn invoice_filenames() {
        for name in [
            "ЭСФ Иванов 15.01.2026.pdf",
            "эсф жумабеков.pdf",
            "Электронный счет-фактура Иванов.pdf",
            "электронный счет фактура петров.pdf",
        ] {
            assert_eq!(classify_name(name), Some(DocKind::Invoice), "{name}");
        }
    }

    #[test]
    fn shipping_note_filenames() {
        for name in [
            "СНТ Иванов.pdf",
            "снт 15.01.2026 жумабеков.pdf",
            "Сопроводительная накладная на товары Иванов.pdf",
            "сопроводительная накладная товары петров.pdf",
        ] {
            assert_eq!(classify_name(name), Some(DocKind::ShippingNote), "{name}");
        }
    }

    #[test]
    fn ignored_filenames() {
        for name in ["readme.txt", "фото.jpg", "ЭСФ Иванов.docx", "счет.pdf", "prices.xlsx"] {
            assert_eq!(classify_name(name), None, "{name}");
        }
    }

    #[test]
    fn classify_requires_a_primary() {
        let files = vec![PathBuf::from("ЭСФ Иванов.pdf")];
        assert!(matches!(classify(&files), Err(RunError::NoPrimaryDocuments)));
    }

    #[test]
    fn classify_buckets_in_archive_order() {
        let files = vec![
            PathBuf::from("box/1.pdf"),
            PathBuf::from("box/СНТ Иванов.pdf"),
            PathBuf::from("box/2.xlsx"),
            PathBuf::from("box/ЭСФ Иванов.pdf"),
            PathBuf::from("box/мусор.bin"),
        ];
        let c = classify(&files).unwrap();
        assert_eq!(c.primaries, vec![PathBuf::from("box/1.pdf"), PathBuf::from("box/2.xlsx")]);
        assert_eq!(c.invoices, vec![PathBuf::from("box/ЭСФ Иванов.pdf")]);
        assert_eq!(c.shipping_notes, vec![PathBuf::from("box/СНТ Иванов.pdf")]);
    }

    #[test]
    fn spreadsheet_detection() {
        assert!(is_spreadsheet(Path::new("a/2.XLSX")));
        assert!(!is_spreadsheet(Path::new("a/2.pdf")));
    }
}
