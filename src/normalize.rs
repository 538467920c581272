//! Subject-name canonicalisation.
//!
//! Spreadsheet exports and the hours configuration spell the same subject
//! differently ("0633. Matemàtiques", "MP3060_Preparació", curly
//! apostrophes, decomposed accents). Both sides go through [`normalize`]
//! before they are compared.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// A leading course code: a non-space run holding a digit, then a separator.
static COURSE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s]*\d+[^\s]*[._\-\s]\s*").expect("valid course code regex"));

pub fn normalize(raw: &str) -> String {
    let stripped = strip_course_code(raw);
    let lowered = stripped.to_lowercase();
    unify_apostrophes(&lowered).nfc().collect()
}

/// Removes leading course codes until none is left, so that
/// `normalize(normalize(x)) == normalize(x)`.
fn strip_course_code(raw: &str) -> &str {
    let mut current = raw.trim();
    while let Some(found) = COURSE_CODE.find(current) {
        current = current[found.end()..].trim();
    }
    current
}

fn unify_apostrophes(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{2019}' | '\u{2018}' | '\u{00B4}' | '`' => '\'',
            other => other,
        })
        .collect()
}
