//! The ingestion collaborator: raw problem rows per (company, timeframe).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::problem::{Difficulty, ProblemRecord};
use crate::ops::identity::identity_key;
use crate::util::collate::fold_name;

/// Error type for ingestion source operations
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("no dataset for {company} ({timeframe})")]
    NotFound { company: String, timeframe: String },
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// A numeric cell that may arrive as a number or as text ("1,234", "45.2%")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Number(f64),
    Text(String),
}

/// One tabular row as supplied by the source. Every column is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProblemRow {
    #[serde(rename = "Difficulty", default)]
    pub difficulty: Option<String>,
    #[serde(rename = "Title", default)]
    pub title: Option<String>,
    #[serde(rename = "Frequency", default)]
    pub frequency: Option<RawNumber>,
    #[serde(rename = "Acceptance Rate", default)]
    pub acceptance_rate: Option<RawNumber>,
    #[serde(rename = "Link", default)]
    pub link: Option<String>,
    /// Comma-joined tag list
    #[serde(rename = "Topics", default)]
    pub topics: Option<String>,
}

/// A (company, timeframe) dataset the source can serve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    pub company: String,
    pub timeframe: String,
    /// Display order of the timeframe (from the `N. ` file prefix)
    pub order: u64,
}

/// Supplier of raw rows for each partition.
#[async_trait]
pub trait ProblemSource: Send + Sync {
    /// Every partition the source knows about
    fn partitions(&self) -> Vec<PartitionInfo>;

    /// Fetch the raw rows of one partition. Company and timeframe match
    /// case-insensitively.
    async fn fetch_rows(
        &self,
        company: &str,
        timeframe: &str,
    ) -> Result<Vec<RawProblemRow>, SourceError>;
}

fn entry_key(company: &str, timeframe: &str) -> String {
    format!("{}__{}", fold_name(company), fold_name(timeframe))
}

// ---------------------------------------------------------------------------
// Row transform
// ---------------------------------------------------------------------------

static NUMBER_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").expect("valid number regex")
});

/// Parse a numeric cell leniently: thousands separators are stripped, a
/// leading number is taken from text like "45.2%", anything else is 0.
pub fn parse_number(value: Option<&RawNumber>) -> f64 {
    let parsed = match value {
        Some(RawNumber::Number(n)) => *n,
        Some(RawNumber::Text(text)) => {
            let cleaned = text.trim().replace(',', "");
            NUMBER_PREFIX
                .find(&cleaned)
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .unwrap_or(0.0)
        }
        None => 0.0,
    };
    if parsed.is_finite() { parsed } else { 0.0 }
}

/// Split a comma-joined topic list, dropping empty entries.
pub fn parse_topics(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Turn raw rows into records. Rows without a title are dropped; unknown
/// difficulties become Medium.
pub fn transform_rows(rows: &[RawProblemRow], company: &str, timeframe: &str) -> Vec<ProblemRecord> {
    rows.iter()
        .filter_map(|row| {
            let title = row.title.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
            Some(ProblemRecord {
                company: company.to_string(),
                timeframe: timeframe.to_string(),
                title: title.to_string(),
                difficulty: row
                    .difficulty
                    .as_deref()
                    .and_then(Difficulty::parse)
                    .unwrap_or(Difficulty::Medium),
                frequency: parse_number(row.frequency.as_ref()),
                acceptance_rate: parse_number(row.acceptance_rate.as_ref()),
                link: row.link.as_deref().map(str::trim).unwrap_or_default().to_string(),
                topics: parse_topics(row.topics.as_deref()),
            })
        })
        .collect()
}

/// Deduplicate by identity key, keeping the first occurrence and its position.
pub fn dedupe_records<T>(records: impl IntoIterator<Item = T>) -> Vec<T>
where
    T: std::ops::Deref<Target = ProblemRecord>,
{
    let mut unique: IndexMap<String, T> = IndexMap::new();
    for record in records {
        unique.entry(identity_key(&*record)).or_insert(record);
    }
    unique.into_values().collect()
}

// ---------------------------------------------------------------------------
// Directory source
// ---------------------------------------------------------------------------

static BUCKET_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d+)\.\s*(.+?)\.json$").expect("valid bucket file regex")
});

#[derive(Debug, Clone)]
struct DirEntry {
    info: PartitionInfo,
    path: PathBuf,
}

/// Reads `<root>/<Company>/<N. Timeframe>.json`, each file a JSON array of
/// rows. The tree is scanned once when the source is opened.
#[derive(Debug)]
pub struct DirSource {
    root: PathBuf,
    entries: HashMap<String, DirEntry>,
}

/// Split a file name like `"2. Three Months.json"` into (timeframe, order).
fn parse_bucket_file_name(file_name: &str) -> Option<(String, u64)> {
    let name = file_name.trim();
    if let Some(caps) = BUCKET_FILE.captures(name) {
        let order = caps[1].parse().unwrap_or(u64::MAX);
        return Some((caps[2].trim().to_string(), order));
    }
    let stem = name
        .strip_suffix(".json")
        .or_else(|| name.strip_suffix(".JSON"))?
        .trim();
    if stem.is_empty() {
        return None;
    }
    Some((stem.to_string(), u64::MAX))
}

impl DirSource {
    pub fn open(root: &Path) -> Result<Self, SourceError> {
        let read_dir = |path: &Path| {
            fs::read_dir(path).map_err(|e| SourceError::ReadError {
                path: path.to_path_buf(),
                source: e,
            })
        };

        let mut entries = HashMap::new();
        for company_entry in read_dir(root)?.flatten() {
            let company_path = company_entry.path();
            if !company_path.is_dir() {
                continue;
            }
            let Some(company) = company_path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let company = company.to_string();
            for file_entry in read_dir(&company_path)?.flatten() {
                let path = file_entry.path();
                let Some((timeframe, order)) = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(parse_bucket_file_name)
                else {
                    continue;
                };
                entries.insert(
                    entry_key(&company, &timeframe),
                    DirEntry {
                        info: PartitionInfo {
                            company: company.clone(),
                            timeframe,
                            order,
                        },
                        path,
                    },
                );
            }
        }

        debug!(root = %root.display(), partitions = entries.len(), "scanned problem data");
        Ok(DirSource {
            root: root.to_path_buf(),
            entries,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ProblemSource for DirSource {
    fn partitions(&self) -> Vec<PartitionInfo> {
        let mut infos: Vec<PartitionInfo> = self.entries.values().map(|e| e.info.clone()).collect();
        infos.sort_by(|a, b| {
            a.company
                .cmp(&b.company)
                .then(a.order.cmp(&b.order))
                .then_with(|| a.timeframe.cmp(&b.timeframe))
        });
        infos
    }

    async fn fetch_rows(
        &self,
        company: &str,
        timeframe: &str,
    ) -> Result<Vec<RawProblemRow>, SourceError> {
        let entry = self
            .entries
            .get(&entry_key(company, timeframe))
            .ok_or_else(|| SourceError::NotFound {
                company: company.to_string(),
                timeframe: timeframe.to_string(),
            })?;
        let text = tokio::fs::read_to_string(&entry.path)
            .await
            .map_err(|e| SourceError::ReadError {
                path: entry.path.clone(),
                source: e,
            })?;
        serde_json::from_str(&text).map_err(|e| SourceError::ParseError {
            path: entry.path.clone(),
            source: e,
        })
    }
}

// ---------------------------------------------------------------------------
// In-memory source
// ---------------------------------------------------------------------------

/// A source backed by rows held in memory. Counts fetches and can delay
/// them, which makes in-flight behavior observable.
#[derive(Debug, Default)]
pub struct MemorySource {
    partitions: Vec<PartitionInfo>,
    rows: HashMap<String, Vec<RawProblemRow>>,
    delay: Option<Duration>,
    fetches: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partition(mut self, company: &str, timeframe: &str, rows: Vec<RawProblemRow>) -> Self {
        let order = self
            .partitions
            .iter()
            .filter(|p| p.company == company)
            .count() as u64
            + 1;
        self.partitions.push(PartitionInfo {
            company: company.to_string(),
            timeframe: timeframe.to_string(),
            order,
        });
        self.rows.insert(entry_key(company, timeframe), rows);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `fetch_rows` calls served so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Most `fetch_rows` calls that were running at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProblemSource for MemorySource {
    fn partitions(&self) -> Vec<PartitionInfo> {
        self.partitions.clone()
    }

    async fn fetch_rows(
        &self,
        company: &str,
        timeframe: &str,
    ) -> Result<Vec<RawProblemRow>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.rows
            .get(&entry_key(company, timeframe))
            .cloned()
            .ok_or_else(|| SourceError::NotFound {
                company: company.to_string(),
                timeframe: timeframe.to_string(),
            })
    }
}

/// Build a raw row with the common columns filled in.
pub fn raw_row(title: &str, difficulty: &str, link: &str, topics: &str) -> RawProblemRow {
    RawProblemRow {
        difficulty: Some(difficulty.to_string()),
        title: Some(title.to_string()),
        frequency: None,
        acceptance_rate: None,
        link: Some(link.to_string()),
        topics: Some(topics.to_string()),
    }
}
