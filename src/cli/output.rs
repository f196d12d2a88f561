use serde::Serialize;

use crate::io::ledger::{PersistenceMode, TrackingMap};
use crate::io::remote::LeaderboardEntry;
use crate::io::sync::SyncOutcome;
use crate::model::problem::{Difficulty, ProblemRecord};
use crate::ops::identity::identity_key;
use crate::ops::stats::{DashboardMetrics, ProgressStage};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ProblemJson {
    pub id: String,
    pub title: String,
    pub company: String,
    pub timeframe: String,
    pub difficulty: Difficulty,
    pub frequency: f64,
    pub acceptance_rate: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub link: String,
    pub topics: Vec<String>,
    pub tracked: bool,
}

#[derive(Serialize)]
pub struct ListJson {
    pub selection: String,
    pub total_matches: usize,
    pub truncated: bool,
    pub problems: Vec<ProblemJson>,
}

#[derive(Serialize)]
pub struct StatsJson<'a> {
    pub selection: String,
    pub metrics: &'a DashboardMetrics,
    pub stage: ProgressStage,
}

#[derive(Serialize)]
pub struct TrackedJson {
    pub mode: PersistenceMode,
    pub count: usize,
    pub ids: Vec<String>,
}

#[derive(Serialize)]
pub struct ToggleJson {
    pub id: String,
    pub tracked: bool,
    pub mode: PersistenceMode,
}

#[derive(Serialize)]
pub struct SyncJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

#[derive(Serialize)]
pub struct LeaderboardRowJson<'a> {
    pub rank: usize,
    #[serde(flatten)]
    pub entry: &'a LeaderboardEntry,
    pub is_you: bool,
}

#[derive(Serialize)]
pub struct SelectionJson {
    pub company: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn problem_to_json(record: &ProblemRecord, tracked: &TrackingMap) -> ProblemJson {
    let id = identity_key(record);
    ProblemJson {
        tracked: tracked.get(&id).copied().unwrap_or(false),
        id,
        title: record.title.clone(),
        company: record.company.clone(),
        timeframe: record.timeframe.clone(),
        difficulty: record.difficulty,
        frequency: record.frequency,
        acceptance_rate: record.acceptance_rate,
        link: record.link.clone(),
        topics: record.topics.clone(),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

/// Format a problem as a one-line summary with its id on the right
pub fn format_problem_line(record: &ProblemRecord, tracked: bool) -> String {
    let mark = if tracked { 'x' } else { ' ' };
    let topics = if record.topics.is_empty() {
        String::new()
    } else {
        format!(
            " {}",
            record
                .topics
                .iter()
                .map(|t| format!("#{}", t))
                .collect::<Vec<_>>()
                .join(" ")
        )
    };
    format!(
        "[{}] {:<6} {}{}  ({})",
        mark,
        record.difficulty.to_string(),
        record.title,
        topics,
        identity_key(record)
    )
}

pub fn format_outcome(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Local { tracked } => format!("Using local progress ({} tracked)", tracked),
        SyncOutcome::RemoteAdopted { tracked } => {
            format!("Loaded remote progress ({} tracked)", tracked)
        }
        SyncOutcome::Bootstrapped { tracked } => {
            format!("Uploaded local progress ({} tracked)", tracked)
        }
        SyncOutcome::RemoteUnavailable { tracked } => format!(
            "Remote progress unavailable; using local progress ({} tracked)",
            tracked
        ),
        SyncOutcome::Cancelled => "Sync superseded by a newer sign-in".to_string(),
    }
}

pub fn format_metrics(metrics: &DashboardMetrics, stage: &ProgressStage) -> Vec<String> {
    let mut lines = vec![
        format!("Problems:        {}", metrics.total),
        format!(
            "Difficulty:      {} easy, {} medium, {} hard",
            metrics.difficulty.easy, metrics.difficulty.medium, metrics.difficulty.hard
        ),
        format!("Avg frequency:   {:.1}", metrics.average_frequency),
        format!("Avg acceptance:  {:.1}%", metrics.average_acceptance),
        format!("Topics:          {}", metrics.topic_count),
        format!(
            "Tracked:         {} of {} ({:.0}%)",
            metrics.tracking.tracked, metrics.tracking.total, metrics.tracking.percent
        ),
        format!(
            "Stage:           {} ({:.0}%, {} to go)",
            stage.stage, stage.progress, stage.remaining_in_stage
        ),
    ];
    if !metrics.frequency_buckets.is_empty() {
        lines.push(String::new());
        lines.push("Frequency".to_string());
        for bucket in &metrics.frequency_buckets {
            lines.push(format!("  {:<10} {}", bucket.label, bucket.count));
        }
    }
    if !metrics.top_topics.is_empty() {
        lines.push(String::new());
        lines.push("Top topics".to_string());
        for topic in &metrics.top_topics {
            lines.push(format!("  {:<24} {}", topic.topic, topic.count));
        }
    }
    lines
}

pub fn format_leaderboard_row(rank: usize, entry: &LeaderboardEntry, is_you: bool) -> String {
    let you = if is_you { "  (you)" } else { "" };
    format!(
        "{:>3}. {:<28} {:>5}{}",
        rank, entry.display_name, entry.tracked_count, you
    )
}

pub fn parse_difficulty(s: &str) -> Result<Difficulty, String> {
    Difficulty::parse(s).ok_or_else(|| {
        format!(
            "unknown difficulty '{}' (expected: easy, medium, hard)",
            s
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn problem_line_shows_mark_topics_and_id() {
        let record = ProblemRecord::new("Acme", "Thirty Days", "Two Sum", Difficulty::Easy)
            .with_topics(&["Array", "Hash Table"])
            .with_link("https://example.com/two-sum");
        assert_eq!(
            format_problem_line(&record, true),
            "[x] Easy   Two Sum #Array #Hash Table  (https://example.com/two-sum)"
        );
    }

    #[test]
    fn problem_json_reads_tracking_by_identity_key() {
        let record = ProblemRecord::new("Acme", "Thirty Days", "Two Sum", Difficulty::Easy);
        let mut tracked = TrackingMap::new();
        tracked.insert("acme::thirty days::two sum".into(), true);
        let json = problem_to_json(&record, &tracked);
        assert!(json.tracked);
        assert_eq!(json.id, "acme::thirty days::two sum");
    }

    #[test]
    fn parse_difficulty_rejects_unknown() {
        assert_eq!(parse_difficulty("HARD"), Ok(Difficulty::Hard));
        assert!(parse_difficulty("brutal").unwrap_err().contains("expected"));
    }
}
