use sha2::{Digest, Sha256};
use std::path::Path;

use freightscan_core::translit::transliterate_for_filename;

/// Encode raw hash bytes as lowercase hex.
pub fn to_hex(hash: &[u8]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Build an ASCII-safe PNG name for a field crop.
///
/// Source documents arrive with Cyrillic file names that break downstream
/// tooling on some filesystems; the crop name is a transliterated, truncated
/// base plus a short content-independent hash of (source name, field label)
/// so crops from different files never collide.
pub fn crop_filename(source: &Path, field_label: &str) -> String {
    let base = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(source.to_string_lossy().as_bytes());
    hasher.update(b"_");
    hasher.update(field_label.as_bytes());
    let digest = hasher.finalize();
    let short = &to_hex(&digest)[..8];

    let safe_base: String = transliterate_for_filename(&base).chars().take(20).collect();

    format!("{safe_base}_{short}_{field_label}.png")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn crop_filename_is_ascii() {
        let name = crop_filename(&PathBuf::from("архив/ЭСФ Абдыкадыров.pdf"), "cena_8");
        assert!(name.is_ascii(), "name was {name}");
        assert!(name.ends_with("_cena_8.png"));
    }

    #[test]
    fn crop_filename_is_deterministic_and_distinct_per_field() {
        let p = PathBuf::from("1.pdf");
        assert_eq!(crop_filename(&p, "date_1"), crop_filename(&p, "date_1"));
        assert_ne!(crop_filename(&p, "date_1"), crop_filename(&p, "kol_ton_7"));
    }

    #[test]
    fn long_base_names_are_truncated() {
        let p = PathBuf::from("сопроводительная накладная на товары Жумабеков.pdf");
        let name = crop_filename(&p, "sopr_nakl_kz_15");
        // base (≤20) + hash (8) + label + separators + extension
        assert!(name.len() <= 20 + 1 + 8 + 1 + "sopr_nakl_kz_15".len() + 4);
    }
}
