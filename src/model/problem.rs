use serde::{Deserialize, Serialize};

/// Problem difficulty, ordered by rank (Easy < Medium < Hard)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// Sort rank (1-based, Easy lowest)
    pub fn rank(self) -> u8 {
        match self {
            Difficulty::Easy => 1,
            Difficulty::Medium => 2,
            Difficulty::Hard => 3,
        }
    }

    /// Upper-case label as it appears in source data
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "EASY",
            Difficulty::Medium => "MEDIUM",
            Difficulty::Hard => "HARD",
        }
    }

    /// Parse a difficulty label, case-insensitive. Returns None for anything
    /// that isn't one of the three known labels.
    pub fn parse(value: &str) -> Option<Difficulty> {
        match value.trim().to_ascii_uppercase().as_str() {
            "EASY" => Some(Difficulty::Easy),
            "MEDIUM" => Some(Difficulty::Medium),
            "HARD" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "Easy"),
            Difficulty::Medium => write!(f, "Medium"),
            Difficulty::Hard => write!(f, "Hard"),
        }
    }
}

/// A single interview problem within one company/timeframe partition.
///
/// Records are created once during ingestion and never mutated afterwards;
/// the catalog shares them as `Arc<ProblemRecord>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemRecord {
    pub company: String,
    /// Named bucket such as "Thirty Days"
    pub timeframe: String,
    /// Non-empty problem title
    pub title: String,
    pub difficulty: Difficulty,
    /// Interview-frequency score (>= 0)
    pub frequency: f64,
    /// Acceptance rate as a percentage
    pub acceptance_rate: f64,
    /// Problem URL, possibly empty
    pub link: String,
    /// Topic tags in source order
    pub topics: Vec<String>,
}

impl ProblemRecord {
    /// Convenience constructor used by tests and fixtures
    pub fn new(company: &str, timeframe: &str, title: &str, difficulty: Difficulty) -> Self {
        ProblemRecord {
            company: company.to_string(),
            timeframe: timeframe.to_string(),
            title: title.to_string(),
            difficulty,
            frequency: 0.0,
            acceptance_rate: 0.0,
            link: String::new(),
            topics: Vec::new(),
        }
    }

    pub fn with_topics(mut self, topics: &[&str]) -> Self {
        self.topics = topics.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_link(mut self, link: &str) -> Self {
        self.link = link.to_string();
        self
    }

    pub fn with_frequency(mut self, frequency: f64) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_acceptance(mut self, acceptance_rate: f64) -> Self {
        self.acceptance_rate = acceptance_rate;
        self
    }

    /// Whether every topic in `required` appears in this record's topic list
    pub fn has_all_topics<'a>(&self, mut required: impl Iterator<Item = &'a String>) -> bool {
        required.all(|topic| self.topics.iter().any(|t| t == topic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_parse_is_case_insensitive() {
        assert_eq!(Difficulty::parse("easy"), Some(Difficulty::Easy));
        assert_eq!(Difficulty::parse(" Hard "), Some(Difficulty::Hard));
        assert_eq!(Difficulty::parse("MEDIUM"), Some(Difficulty::Medium));
        assert_eq!(Difficulty::parse("extreme"), None);
        assert_eq!(Difficulty::parse(""), None);
    }

    #[test]
    fn difficulty_rank_order() {
        assert!(Difficulty::Easy.rank() < Difficulty::Medium.rank());
        assert!(Difficulty::Medium.rank() < Difficulty::Hard.rank());
        assert!(Difficulty::Easy < Difficulty::Hard);
    }

    #[test]
    fn difficulty_serializes_upper_case() {
        let json = serde_json::to_string(&Difficulty::Medium).unwrap();
        assert_eq!(json, "\"MEDIUM\"");
    }

    #[test]
    fn has_all_topics_requires_superset() {
        let record = ProblemRecord::new("Acme", "All", "Two Sum", Difficulty::Easy)
            .with_topics(&["Array", "Hash Table"]);
        let both = ["Array".to_string(), "Hash Table".to_string()];
        let one_missing = ["Array".to_string(), "Graph".to_string()];
        assert!(record.has_all_topics(both.iter()));
        assert!(!record.has_all_topics(one_missing.iter()));
        assert!(record.has_all_topics([].iter()));
    }
}
