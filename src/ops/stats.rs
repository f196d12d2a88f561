use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::io::ledger::TrackingMap;
use crate::model::problem::{Difficulty, ProblemRecord};
use crate::ops::identity::identity_key;
use crate::util::collate::collate;

/// Items per readiness stage
pub const ITEMS_PER_STAGE: usize = 10;

/// Number of topics reported by `top_topics`
pub const TOP_TOPIC_COUNT: usize = 8;

/// Frequency histogram ranges: (label, min inclusive, max exclusive)
const FREQUENCY_RANGES: [(&str, f64, f64); 5] = [
    ("0-25", 0.0, 25.0),
    ("25-50", 25.0, 50.0),
    ("50-75", 50.0, 75.0),
    ("75-90", 75.0, 90.0),
    ("90-100", 90.0, 101.0),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DifficultyBreakdown {
    pub easy: usize,
    pub medium: usize,
    pub hard: usize,
}

impl DifficultyBreakdown {
    pub fn get(&self, difficulty: Difficulty) -> usize {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }

    fn bump(&mut self, difficulty: Difficulty) {
        match difficulty {
            Difficulty::Easy => self.easy += 1,
            Difficulty::Medium => self.medium += 1,
            Difficulty::Hard => self.hard += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyBucket {
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicCount {
    pub topic: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TrackingStats {
    pub total: usize,
    pub tracked: usize,
    pub percent: f64,
}

/// Aggregates over the currently materialized result rows
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardMetrics {
    pub total: usize,
    pub average_frequency: f64,
    pub average_acceptance: f64,
    pub difficulty: DifficultyBreakdown,
    pub topic_count: usize,
    pub frequency_buckets: Vec<FrequencyBucket>,
    pub top_topics: Vec<TopicCount>,
    pub tracking: TrackingStats,
}

impl DashboardMetrics {
    pub fn compute(results: &[Arc<ProblemRecord>], tracked: &TrackingMap) -> Self {
        let total = results.len();
        let mut frequency_sum = 0.0;
        let mut acceptance_sum = 0.0;
        let mut difficulty = DifficultyBreakdown::default();
        let mut topic_counts: HashMap<&str, usize> = HashMap::new();
        let mut buckets: Vec<FrequencyBucket> = FREQUENCY_RANGES
            .iter()
            .map(|(label, _, _)| FrequencyBucket {
                label: *label,
                count: 0,
            })
            .collect();
        let mut tracked_count = 0;

        for record in results {
            frequency_sum += record.frequency;
            acceptance_sum += record.acceptance_rate;
            difficulty.bump(record.difficulty);
            for topic in &record.topics {
                *topic_counts.entry(topic.as_str()).or_default() += 1;
            }
            if let Some(i) = FREQUENCY_RANGES
                .iter()
                .position(|(_, min, max)| record.frequency >= *min && record.frequency < *max)
            {
                buckets[i].count += 1;
            }
            if tracked.get(&identity_key(record)).copied().unwrap_or(false) {
                tracked_count += 1;
            }
        }

        let topic_count = topic_counts.len();
        let mut top_topics: Vec<TopicCount> = topic_counts
            .into_iter()
            .map(|(topic, count)| TopicCount {
                topic: topic.to_string(),
                count,
            })
            .collect();
        top_topics.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| collate(&a.topic, &b.topic)));
        top_topics.truncate(TOP_TOPIC_COUNT);

        let average = |sum: f64| if total > 0 { sum / total as f64 } else { 0.0 };

        DashboardMetrics {
            total,
            average_frequency: average(frequency_sum),
            average_acceptance: average(acceptance_sum),
            difficulty,
            topic_count,
            frequency_buckets: buckets,
            top_topics,
            tracking: TrackingStats {
                total,
                tracked: tracked_count,
                percent: if total > 0 {
                    (tracked_count * 100) as f64 / total as f64
                } else {
                    0.0
                },
            },
        }
    }
}

/// Readiness stage derived from the total number of tracked problems
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressStage {
    pub stage: usize,
    /// Percent complete within the current stage
    pub progress: f64,
    pub remaining_in_stage: usize,
    pub total_tracked: usize,
}

impl ProgressStage {
    pub fn from_total(total_tracked: usize) -> Self {
        let completed_in_stage = total_tracked % ITEMS_PER_STAGE;
        let remaining = ITEMS_PER_STAGE - completed_in_stage;
        ProgressStage {
            stage: total_tracked / ITEMS_PER_STAGE + 1,
            progress: (completed_in_stage * 100) as f64 / ITEMS_PER_STAGE as f64,
            remaining_in_stage: remaining,
            total_tracked,
        }
    }
}
