//! Locale-style string collation for titles and topics.
//!
//! Strings compare case-insensitively first; when they differ only by case,
//! lowercase sorts before uppercase at the first differing position, and
//! anything still equal falls back to a code-point comparison. Every level is
//! lexicographic, so the result is a total order that sort routines and
//! binary searches can rely on.

use std::cmp::Ordering;

/// Lookup form of a company or timeframe name: trimmed and fully lowercased.
pub fn fold_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Whether two names refer to the same company or timeframe.
pub fn same_name(a: &str, b: &str) -> bool {
    fold_name(a) == fold_name(b)
}

/// Compare two strings with case-insensitive primary ordering.
pub fn collate(a: &str, b: &str) -> Ordering {
    primary(a, b)
        .then_with(|| case_level(a, b))
        .then_with(|| a.cmp(b))
}

fn primary(a: &str, b: &str) -> Ordering {
    let left = a.chars().flat_map(char::to_lowercase);
    let right = b.chars().flat_map(char::to_lowercase);
    left.cmp(right)
}

fn case_level(a: &str, b: &str) -> Ordering {
    let left = a.chars().map(|c| c.is_uppercase());
    let right = b.chars().map(|c| c.is_uppercase());
    left.cmp(right)
}
