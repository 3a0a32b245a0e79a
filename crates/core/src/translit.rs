/// Fixed Cyrillic→Latin transliteration, including the Kazakh letters that
/// show up in driver names. Untranslated characters pass through unchanged.
pub fn latin_of(c: char) -> Option<&'static str> {
    Some(match c {
        'А' => "A", 'Б' => "B", 'В' => "V", 'Г' => "G", 'Д' => "D", 'Е' => "E",
        'Ё' => "E", 'Ж' => "Zh", 'З' => "Z", 'И' => "I", 'Й' => "Y", 'К' => "K",
        'Л' => "L", 'М' => "M", 'Н' => "N", 'О' => "O", 'П' => "P", 'Р' => "R",
        'С' => "S", 'Т' => "T", 'У' => "U", 'Ф' => "F", 'Х' => "H", 'Ц' => "Ts",
        'Ч' => "Ch", 'Ш' => "Sh", 'Щ' => "Sch", 'Ъ' => "", 'Ы' => "Y", 'Ь' => "",
        'Э' => "E", 'Ю' => "Yu", 'Я' => "Ya",
        'Ә' => "A", 'Ғ' => "G", 'Қ' => "Q", 'Ң' => "N", 'Ө' => "O", 'Ұ' => "U",
        'Ү' => "U", 'І' => "I",
        'а' => "a", 'б' => "b", 'в' => "v", 'г' => "g", 'д' => "d", 'е' => "e",
        'ё' => "e", 'ж' => "zh", 'з' => "z", 'и' => "i", 'й' => "y", 'к' => "k",
        'л' => "l", 'м' => "m", 'н' => "n", 'о' => "o", 'п' => "p", 'р' => "r",
        'с' => "s", 'т' => "t", 'у' => "u", 'ф' => "f", 'х' => "h", 'ц' => "ts",
        'ч' => "ch", 'ш' => "sh", 'щ' => "sch", 'ъ' => "", 'ы' => "y", 'ь' => "",
        'э' => "e", 'ю' => "yu", 'я' => "ya",
        'ә' => "a", 'ғ' => "g", 'қ' => "q", 'ң' => "n", 'ө' => "o", 'ұ' => "u",
        'ү' => "u", 'і' => "i",
        _ => return None,
    })
}

/// Transliterate a string, keeping alphanumerics, `_` and `-`, and replacing
/// everything else with `_`. Used for ASCII-safe file names.
pub fn transliterate_for_filename(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if let Some(lat) = latin_of(c) {
            out.push_str(lat);
        } else if c.is_alphanumeric() || c == '_' || c == '-' {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    out
}

/// Transliterate preserving all untranslated characters (used for surname
/// matching variants, where punctuation must survive).
pub fn transliterate(text: &str) -> String {
    text.chars()
        .map(|c| latin_of(c).map_or_else(|| c.to_string(), str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transliterates_common_surnames() {
        assert_eq!(transliterate("Иванов"), "Ivanov");
        assert_eq!(transliterate("Жумабеков"), "Zhumabekov");
    }

    #[test]
    fn kazakh_letters_map_to_latin() {
        assert_eq!(transliterate("Қасым"), "Qasym");
        assert_eq!(transliterate("Әлия"), "Aliya");
    }

    #[test]
    fn latin_text_passes_through() {
        assert_eq!(transliterate("Ivanov"), "Ivanov");
    }

    #[test]
    fn filename_variant_replaces_punctuation() {
        assert_eq!(transliterate_for_filename("ФИО Водит. (4)"), "FIO_Vodit___4_");
    }
}
