/// Levenshtein edit distance over characters (not bytes — the filenames
/// being compared are mostly Cyrillic), two-row O(min(m,n)) space.
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    let (m, n) = (a.len(), b.len());

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let (a, b, m, n) = if m <= n { (a, b, m, n) } else { (b, a, n, m) };

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Similarity in [0.0, 1.0] derived from the edit distance.
pub fn similarity(s1: &str, s2: &str) -> f64 {
    if s1 == s2 {
        return 1.0;
    }
    let max_len = s1.chars().count().max(s2.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(s1, s2) as f64 / max_len as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_counts_characters_not_bytes() {
        // Each Cyrillic letter is 2 bytes; distance must still be 1.
        assert_eq!(levenshtein_distance("иванов", "иванев"), 1);
    }

    #[test]
    fn distance_basics() {
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("abc", ""), 3);
        assert_eq!(levenshtein_distance("cat", "bat"), 1);
        assert_eq!(levenshtein_distance("abc", "abc"), 0);
    }

    #[test]
    fn similarity_close_surnames_clear_threshold() {
        // One letter off in a six-letter surname: 5/6 ≈ 0.833.
        assert!(similarity("иванов", "ивонов") > 0.80);
        assert!(similarity("иванов", "петров") < 0.80);
    }

    #[test]
    fn similarity_is_symmetric() {
        assert_eq!(similarity("жумабеков", "жумабеко"), similarity("жумабеко", "жумабеков"));
    }
}
