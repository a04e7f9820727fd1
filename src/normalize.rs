//! Text normalization shared by title and artist canonicalization.
//!
//! CRITICAL: Every fingerprint depends on this output. Changing any rule here
//! regroups duplicates across the whole collection, so run the tests after changes.

use unicode_normalization::UnicodeNormalization;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is in the Combining Diacritical Marks block.
/// Only this block is stripped; marks from the extended blocks fall through
/// to the non-alphanumeric rule below and become spaces.
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F)
}

/// Quote characters removed outright (not replaced by a space), so
/// "Don't" and "Dont" normalize identically.
pub fn is_quote(c: char) -> bool {
    matches!(c, '\'' | '"' | '\u{2019}')
}

/// Decompose and drop diacritics, then lower-case.
/// e.g., "Beyoncé" → "beyonce", "ÄRTÏST" → "artist"
pub fn fold_diacritics(s: &str) -> String {
    s.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Canonicalize free text into a comparable form.
///
/// Applied in order:
/// 1. NFKD decomposition with combining marks stripped
/// 2. lower-casing
/// 3. quote removal
/// 4. `&` → `and`
/// 5. anything outside `[a-z0-9 ]` → space
/// 6. whitespace runs collapsed, ends trimmed
///
/// Total over any input; the result never contains `|`.
pub fn normalize(s: &str) -> String {
    let folded = fold_diacritics(s);

    let mut mapped = String::with_capacity(folded.len());
    for c in folded.chars() {
        match c {
            c if is_quote(c) => {}
            '&' => mapped.push_str("and"),
            'a'..='z' | '0'..='9' => mapped.push(c),
            _ => mapped.push(' '),
        }
    }

    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// TESTS
// ============================================================================
