/// Number of Unicode scalar values, the unit used for short-query checks.
pub fn rune_len(s: &str) -> usize {
    s.chars().count()
}

/// Substring test that respects word boundaries for ASCII terms.
///
/// `"to"` matches in `"go to ueno"` but not in `"tokyo"`; CJK terms are plain substrings.
/// `haystack` is expected to be lowercased already.
pub fn contains_term(haystack: &str, term: &str) -> bool {
    let term = term.to_lowercase();
    if term.is_empty() {
        return false;
    }
    if !term.is_ascii() {
        return haystack.contains(&term);
    }

    let is_word = |c: char| c.is_ascii_alphanumeric();
    let mut start = 0;
    while let Some(offset) = haystack[start..].find(&term) {
        let begin = start + offset;
        let end = begin + term.len();
        let before_ok = haystack[..begin].chars().next_back().map_or(true, |c| !is_word(c));
        let after_ok = haystack[end..].chars().next().map_or(true, |c| !is_word(c));
        if before_ok && after_ok {
            return true;
        }
        start = begin + term.len();
    }
    false
}

pub fn contains_any_term(haystack: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| contains_term(haystack, t))
}
