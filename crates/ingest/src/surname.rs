use freightscan_core::translit::transliterate;

/// Latin glyphs OCR drops into Cyrillic surnames, mapped to the letter
/// actually printed.
const LAT_TO_CYR: &[(char, char)] = &[
    ('i', 'и'),
    ('o', 'о'),
    ('a', 'а'),
    ('e', 'е'),
    ('c', 'с'),
    ('p', 'р'),
    ('y', 'у'),
    ('x', 'х'),
    ('H', 'Н'),
    ('K', 'К'),
    ('M', 'М'),
    ('B', 'В'),
    ('T', 'Т'),
];

/// Spellings a surname may appear under in auxiliary filenames: the
/// OCR-ed original, a confusable-repaired Cyrillic form, and a full
/// Latin transliteration. The original always comes first; duplicates
/// collapse.
pub fn surname_variants(surname: &str) -> Vec<String> {
    if surname.is_empty() {
        return Vec::new();
    }

    let repaired: String = surname
        .chars()
        .map(|c| {
            LAT_TO_CYR
                .iter()
                .find(|(lat, _)| *lat == c)
                .map(|(_, cyr)| *cyr)
                .unwrap_or(c)
        })
        .collect();

    let mut variants = vec![surname.to_string()];
    for v in [repaired, transliterate(surname)] {
        if !variants.contains(&v) {
            variants.push(v);
        }
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn original_comes_first() {
        let v = surname_variants("Иванов");
        assert_eq!(v[0], "Иванов");
    }

    #[test]
    fn confusables_repaired() {
        // Latin o and a inside an otherwise Cyrillic surname.
        let v = surname_variants("Иванoв");
        assert!(v.contains(&"Иванов".to_string()));
    }

    #[test]
    fn latin_transliteration_included() {
        let v = surname_variants("Жумабеков");
        assert!(v.contains(&"Zhumabekov".to_string()));
    }

    #[test]
    fn no_duplicates_for_pure_latin() {
        // Repair touches nothing, transliteration passes Latin through,
        // so all three forms coincide except for repaired uppercase.
        let v = surname_variants("Smith");
        assert_eq!(v.len(), v.iter().collect::<std::collections::HashSet<_>>().len());
    }

    #[test]
    fn empty_surname_yields_no_variants() {
        assert!(surname_variants("").is_empty());
    }
}
