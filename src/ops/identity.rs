//! Identity keys for problem records.
//!
//! A key is a pure function of a record's fields. Records that share a
//! non-empty link collapse to the same key regardless of company or
//! timeframe; records without a link fall back to
//! `company::timeframe::title`. Keys are persisted as tracking identifiers
//! and double as list-row keys, so the format must never change.
//!
//! The `::` delimiter is not escaped: a title containing `::` can collide
//! with a different (company, timeframe, title) split of the same text.

use crate::model::problem::ProblemRecord;

fn sanitize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Derive the identity key of a record.
pub fn identity_key(record: &ProblemRecord) -> String {
    build_identity_key(
        &record.company,
        &record.timeframe,
        &record.title,
        &record.link,
    )
}

/// Derive an identity key from raw fields (used before a record exists).
pub fn build_identity_key(company: &str, timeframe: &str, title: &str, link: &str) -> String {
    if !link.trim().is_empty() {
        return sanitize(link);
    }
    sanitize(&format!("{}::{}::{}", company, timeframe, title))
}
