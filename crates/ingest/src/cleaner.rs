//! Per-field text cleanup. OCR output is noisy in predictable ways
//! (ruble sign for Cyrillic Р, Latin/Cyrillic confusables on plates,
//! spaced digit groups in weights), so each field gets its own rule.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_dotted_date, r"\b(\d{2}\.\d{2}\.\d{4})\b");
re!(re_dashed_date, r"(\d{2}-\d{2}-\d{4})");
re!(re_weight_netto, r"(?i)(\d{2}\s?\d{3})\s*нетто");
re!(re_cmr_suffix, r"(?i)\s*(cmp|смп|смр|cmr)");
re!(re_snt_number, r"(KZ-SNT-[\w-]+(?:\s+[\w-]+)*)");
re!(re_non_plate, r"[^A-Z0-9/]");

/// The recognizer reads ₽ where the document prints Cyrillic Р.
pub fn replace_ruble(text: &str) -> String {
    text.replace('₽', "Р")
}

pub fn strip_quotes(text: &str) -> String {
    text.trim_matches('\'').to_string()
}

/// Fallback inputs for date recovery when the OCR crop holds no date.
pub struct DateContext<'a> {
    pub surname: &'a str,
    pub archive_name: &'a str,
    /// Invoice and shipping-note paths, in archive order.
    pub aux_files: &'a [PathBuf],
}

/// Pull a DD.MM.YYYY date out of the OCR text, falling back to the
/// surname-matched auxiliary filenames, then to the archive name
/// (which carries dashes instead of dots).
pub fn clean_date(text: &str, ctx: &DateContext<'_>) -> String {
    if let Some(m) = re_dotted_date().captures(text) {
        return m[1].to_string();
    }

    if !ctx.surname.is_empty() {
        let needle = ctx.surname.to_lowercase();
        for path in ctx.aux_files {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.to_lowercase().contains(&needle) {
                if let Some(m) = re_dotted_date().captures(name) {
                    return m[1].to_string();
                }
            }
        }
    }

    if let Some(m) = re_dashed_date().captures(ctx.archive_name) {
        return m[1].replace('-', ".");
    }

    text.to_string()
}

/// Plate characters OCR-ed as their Cyrillic lookalikes, mapped back.
const PLATE_CONFUSABLES: &[(char, char)] = &[
    ('А', 'A'),
    ('В', 'B'),
    ('Е', 'E'),
    ('К', 'K'),
    ('М', 'M'),
    ('Н', 'H'),
    ('О', 'O'),
    ('Р', 'P'),
    ('С', 'C'),
    ('Т', 'T'),
    ('У', 'Y'),
    ('Х', 'X'),
];

/// Normalize one plate or brand token: uppercase, Cyrillic lookalikes
/// to Latin, L and | to I, O to 0, S to 5, then strip everything
/// outside A-Z 0-9 /.
pub fn clean_plate_text(text: &str) -> String {
    let mut t: String = text
        .trim()
        .to_uppercase()
        .chars()
        .map(|c| {
            PLATE_CONFUSABLES
                .iter()
                .find(|(cyr, _)| *cyr == c)
                .map(|(_, lat)| *lat)
                .unwrap_or(c)
        })
        .collect();
    t = t.replace(['L', '|'], "I");
    t = t.replace('O', "0").replace('S', "5");
    re_non_plate().replace_all(&t, "").into_owned()
}

/// Line-number artifacts that precede the plate and brand crops.
const PLATE_NOISE: &[&str] = &["25", "26", "27", "28", "29", "30"];
/// Line-number artifacts that precede the driver-name crop.
const NAME_NOISE: &[&str] = &["21", "22", "23", "24"];

/// Keep candidates whose glyph height says "stamped plate text", then
/// drop leading line-number noise.
pub fn filter_plate_candidates(candidates: &[(String, u32)]) -> Vec<String> {
    let mut filtered: Vec<String> = candidates
        .iter()
        .filter(|(_, h)| *h > 35 && *h < 46)
        .map(|(t, _)| t.trim().to_string())
        .collect();
    while filtered.first().is_some_and(|t| PLATE_NOISE.contains(&t.as_str())) {
        filtered.remove(0);
    }
    filtered
}

/// Join the plate crop's candidates into the display value. Two or
/// more survivors: the first is the registration number, the last the
/// region code, joined with `" / "`; intermediate OCR fragments are
/// discarded.
pub fn join_plate_pair(candidates: &[(String, u32)]) -> String {
    let filtered = filter_plate_candidates(candidates);
    match filtered.as_slice() {
        [] => String::new(),
        [only] => clean_plate_text(only),
        [first, .., last] => {
            format!("{} / {}", clean_plate_text(first), clean_plate_text(last))
        }
    }
}

/// Pick the driver name from the candidate list: drop date-shaped
/// lines, keep plausible heights, strip leading line-number noise,
/// take the first survivor and normalize its trailing punctuation to
/// a period.
pub fn clean_driver_name(candidates: &[(String, u32)]) -> String {
    let mut filtered: Vec<&str> = candidates
        .iter()
        .filter(|(t, h)| !re_dotted_date().is_match(t) && *h > 35 && *h < 500)
        .map(|(t, _)| t.trim())
        .collect();
    while filtered.first().is_some_and(|t| NAME_NOISE.contains(t)) {
        filtered.remove(0);
    }

    let Some(first) = filtered.first() else {
        return String::new();
    };
    let mut t = (*first).to_string();
    if let Some(stripped) = t.strip_suffix(':').or_else(|| t.strip_suffix('-')) {
        t = format!("{stripped}.");
    }
    t = replace_ruble(&t);
    if !t.ends_with('.') {
        t.push('.');
    }
    t
}

/// Net weight prints as "20 000 нетто"; collapse the digit groups.
pub fn clean_weight(text: &str) -> String {
    if let Some(m) = re_weight_netto().captures(text) {
        return m[1].replace(' ', "");
    }
    text.to_string()
}

/// The waybill code is the primary document's own filename, minus
/// extension, stray dots and the CMR suffix token.
pub fn clean_waybill(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .replace('.', "");
    let stripped = re_cmr_suffix().replace_all(&stem, "");
    stripped.trim_matches('\'').trim().to_string()
}

/// SNT numbers sometimes OCR with interior spaces; reassemble.
pub fn clean_note_number(text: &str) -> String {
    if let Some(m) = re_snt_number().captures(text) {
        return m[1].replace(' ', "");
    }
    text.to_string()
}
