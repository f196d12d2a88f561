//! Filter, order and bound a problem catalog.
//!
//! `query` makes one pass over the catalog. With a finite limit it keeps a
//! sorted buffer of at most `limit` matches: a candidate that does not sort
//! strictly before the current last entry is rejected in O(1), otherwise it
//! is placed by binary search and the last entry is dropped. That is
//! O(N log K) instead of a full O(N log N) sort of every match. Insertion
//! uses the upper-bound position, so equal candidates keep catalog order and
//! the output is exactly the prefix of a stable full sort.

use std::cmp::Ordering;
use std::num::NonZeroUsize;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::filter::{FilterState, SortDirection, SortField, SortState};
use crate::model::problem::{Difficulty, ProblemRecord};
use crate::util::collate::collate;

/// Maximum number of results to materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Limit {
    Bounded(NonZeroUsize),
    Unbounded,
}

impl Limit {
    pub fn bounded(&self) -> Option<usize> {
        match self {
            Limit::Bounded(n) => Some(n.get()),
            Limit::Unbounded => None,
        }
    }

    /// Grow a bounded limit by `step` rows. Unbounded stays unbounded.
    pub fn grow(self, step: usize) -> Limit {
        match self {
            Limit::Bounded(n) => Limit::from(n.get().saturating_add(step)),
            Limit::Unbounded => Limit::Unbounded,
        }
    }
}

/// A count of zero means "no limit", never "nothing".
impl From<usize> for Limit {
    fn from(n: usize) -> Self {
        match NonZeroUsize::new(n) {
            Some(n) => Limit::Bounded(n),
            None => Limit::Unbounded,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Matches in sort order, at most `limit` of them
    pub results: Vec<Arc<ProblemRecord>>,
    /// Number of catalog records that passed the filter
    pub total_matches: usize,
    /// True when the limit cut off some matches
    pub truncated: bool,
}

/// A filter compiled once per query: search is trimmed and lowercased.
struct Predicate<'a> {
    search: String,
    difficulties: &'a std::collections::BTreeSet<Difficulty>,
    topics: &'a std::collections::BTreeSet<String>,
}

impl<'a> Predicate<'a> {
    fn new(filters: &'a FilterState) -> Self {
        Predicate {
            search: filters.search.trim().to_lowercase(),
            difficulties: &filters.difficulties,
            topics: &filters.topics,
        }
    }

    fn matches(&self, record: &ProblemRecord) -> bool {
        if !self.difficulties.is_empty() && !self.difficulties.contains(&record.difficulty) {
            return false;
        }
        if !self.topics.is_empty() && !record.has_all_topics(self.topics.iter()) {
            return false;
        }
        if !self.search.is_empty() {
            let haystack = format!("{} {}", record.title, record.topics.join(" ")).to_lowercase();
            if !haystack.contains(&self.search) {
                return false;
            }
        }
        true
    }
}

/// Whether a record passes every clause of the filter.
pub fn matches_filter(record: &ProblemRecord, filters: &FilterState) -> bool {
    Predicate::new(filters).matches(record)
}

/// Order two records by the given field and direction.
///
/// Difficulty ties fall back to title order; the direction applies to the
/// combined result, so descending flips both.
pub fn compare(
    a: &ProblemRecord,
    b: &ProblemRecord,
    field: SortField,
    direction: SortDirection,
) -> Ordering {
    let ordering = match field {
        SortField::Title => collate(&a.title, &b.title),
        SortField::Difficulty => a
            .difficulty
            .rank()
            .cmp(&b.difficulty.rank())
            .then_with(|| collate(&a.title, &b.title)),
    };
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Upper-bound insertion index: after every element that is not greater than `item`.
fn insertion_index<T>(items: &[T], item: &T, cmp: impl Fn(&T, &T) -> Ordering) -> usize {
    items.partition_point(|existing| cmp(item, existing) != Ordering::Less)
}

/// Filter, sort and bound the catalog.
pub fn query(
    catalog: &[Arc<ProblemRecord>],
    filters: &FilterState,
    sort: &SortState,
    limit: Limit,
) -> QueryResult {
    let predicate = Predicate::new(filters);
    let cmp = |a: &Arc<ProblemRecord>, b: &Arc<ProblemRecord>| {
        compare(a, b, sort.field, sort.direction)
    };

    let bound = limit.bounded();
    let mut results: Vec<Arc<ProblemRecord>> = Vec::with_capacity(bound.unwrap_or(0).min(catalog.len()));
    let mut total_matches = 0;

    for record in catalog {
        if !predicate.matches(record) {
            continue;
        }
        total_matches += 1;

        let Some(bound) = bound else {
            results.push(Arc::clone(record));
            continue;
        };

        if results.len() < bound {
            let index = insertion_index(&results, record, cmp);
            results.insert(index, Arc::clone(record));
            continue;
        }

        // Full buffer: anything not strictly better than the worst is dropped.
        if let Some(worst) = results.last()
            && cmp(record, worst) != Ordering::Less
        {
            continue;
        }
        let index = insertion_index(&results, record, cmp);
        results.insert(index, Arc::clone(record));
        results.pop();
    }

    if bound.is_none() {
        results.sort_by(cmp);
    }

    QueryResult {
        results,
        total_matches,
        truncated: bound.is_some_and(|b| total_matches > b),
    }
}

/// Distinct topics across the given records, in collation order.
pub fn distinct_topics<'a>(records: impl IntoIterator<Item = &'a Arc<ProblemRecord>>) -> Vec<String> {
    let mut topics: Vec<String> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for record in records {
        for topic in &record.topics {
            if seen.insert(topic.as_str()) {
                topics.push(topic.clone());
            }
        }
    }
    topics.sort_by(|a, b| collate(a, b));
    topics
}
