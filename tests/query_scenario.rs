//! End-to-end query over a mid-sized catalog: hard graph problems, first
//! page by title.

use std::collections::BTreeSet;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use prepdeck::model::filter::{FilterState, SortDirection, SortField, SortState};
use prepdeck::model::problem::{Difficulty, ProblemRecord};
use prepdeck::ops::query::{Limit, query};
use prepdeck::util::collate::collate;

/// 120 records spread over the three difficulties. Every fourth record is
/// tagged "graph"; titles are shuffled so catalog order is not title order.
fn catalog() -> Vec<Arc<ProblemRecord>> {
    (0..120)
        .map(|i| {
            let difficulty = Difficulty::ALL[i % 3];
            let topics: &[&str] = if i % 4 == 0 {
                &["graph", "bfs"]
            } else {
                &["array"]
            };
            let title = format!("Problem {:03}", (i * 37) % 120);
            Arc::new(
                ProblemRecord::new("Acme", "Thirty Days", &title, difficulty)
                    .with_topics(topics)
                    .with_link(&format!("https://example.com/p/{i}")),
            )
        })
        .collect()
}

#[test]
fn hard_graph_first_page() {
    let catalog = catalog();
    let filters = FilterState {
        search: String::new(),
        difficulties: BTreeSet::from([Difficulty::Hard]),
        topics: BTreeSet::from(["graph".to_string()]),
    };
    let sort = SortState::new(SortField::Title, SortDirection::Asc);

    let result = query(&catalog, &filters, &sort, Limit::from(10));

    let expected_total = catalog
        .iter()
        .filter(|r| r.difficulty == Difficulty::Hard && r.topics.iter().any(|t| t == "graph"))
        .count();
    assert_eq!(expected_total, 10);
    assert_eq!(result.total_matches, expected_total);
    assert!(result.results.len() <= 10);
    assert!(!result.truncated);

    for record in &result.results {
        assert_eq!(record.difficulty, Difficulty::Hard);
        assert!(record.topics.iter().any(|t| t == "graph"));
    }
    for pair in result.results.windows(2) {
        assert_eq!(
            collate(&pair[0].title, &pair[1].title),
            std::cmp::Ordering::Less,
            "{} should sort before {}",
            pair[0].title,
            pair[1].title
        );
    }
}

#[test]
fn smaller_page_truncates_and_keeps_lowest_titles() {
    let catalog = catalog();
    let filters = FilterState {
        difficulties: BTreeSet::from([Difficulty::Hard]),
        topics: BTreeSet::from(["graph".to_string()]),
        ..FilterState::default()
    };
    let sort = SortState::default();

    let page = query(&catalog, &filters, &sort, Limit::from(4));
    let everything = query(&catalog, &filters, &sort, Limit::Unbounded);

    assert!(page.truncated);
    assert_eq!(page.total_matches, everything.total_matches);
    let page_titles: Vec<&str> = page.results.iter().map(|r| r.title.as_str()).collect();
    let first_titles: Vec<&str> = everything.results[..4]
        .iter()
        .map(|r| r.title.as_str())
        .collect();
    assert_eq!(page_titles, first_titles);
}
