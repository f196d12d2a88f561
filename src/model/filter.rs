use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::problem::Difficulty;

/// Active filters. Empty sets mean "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub difficulties: BTreeSet<Difficulty>,
    /// Required topics (a record must carry all of them)
    #[serde(default)]
    pub topics: BTreeSet<String>,
}

impl FilterState {
    /// Whether any clause restricts the catalog
    pub fn is_active(&self) -> bool {
        !self.search.trim().is_empty() || !self.difficulties.is_empty() || !self.topics.is_empty()
    }

    /// Add the difficulty if absent, remove it if present
    pub fn toggle_difficulty(&mut self, difficulty: Difficulty) {
        if !self.difficulties.remove(&difficulty) {
            self.difficulties.insert(difficulty);
        }
    }

    /// Add the topic if absent, remove it if present
    pub fn toggle_topic(&mut self, topic: &str) {
        if !self.topics.remove(topic) {
            self.topics.insert(topic.to_string());
        }
    }

    /// Drop required topics that the given topic universe does not contain.
    pub fn retain_topics(&mut self, available: &[String]) {
        self.topics.retain(|t| available.iter().any(|a| a == t));
    }

    /// Reset search, difficulties and topics
    pub fn clear(&mut self) {
        self.search.clear();
        self.difficulties.clear();
        self.topics.clear();
    }
}

/// Which field results are ordered by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Title,
    Difficulty,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortState {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortState {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        SortState { field, direction }
    }

    /// Column-header behavior: selecting the current field flips ascending to
    /// descending; anything else starts ascending.
    pub fn select(self, field: SortField) -> Self {
        let direction = if self.field == field && self.direction == SortDirection::Asc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        SortState { field, direction }
    }
}
