//! The shared document store behind signed-in sessions.
//!
//! Two collections: `userTracking/<uid>.json` holds a user's tracked ids and
//! `leaderboard/<uid>.json` holds the denormalized summary the leaderboard
//! ranks. `DirRemoteStore` keeps both under one directory, which can be any
//! synced or network-mounted path.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::io::auth::{Identity, normalize_display_name};
use crate::io::ledger::TrackingMap;
use crate::io::local_store::atomic_write;
use crate::io::lock::DirLock;
use crate::util::collate::collate;

pub const TRACKING_COLLECTION: &str = "userTracking";
pub const LEADERBOARD_COLLECTION: &str = "leaderboard";
/// Default number of leaderboard entries fetched
pub const LEADERBOARD_LIMIT: usize = 15;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for remote synchronization
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("could not fetch remote progress for {user_id}: {source}")]
    Fetch {
        user_id: String,
        #[source]
        source: BoxError,
    },
    #[error("could not write remote {document} for {user_id}: {source}")]
    Write {
        user_id: String,
        document: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("could not watch the leaderboard: {0}")]
    Watch(String),
    #[error("invalid user id {0:?}")]
    InvalidUser(String),
}

/// Progress document of one user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingDocument {
    #[serde(default)]
    pub tracked_problem_ids: Vec<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Leaderboard document of one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardSummary {
    pub display_name: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub tracked_count: usize,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl LeaderboardSummary {
    pub fn new(identity: &Identity, tracked_count: usize) -> Self {
        LeaderboardSummary {
            display_name: identity.normalized_name(),
            photo_url: identity.photo.clone(),
            tracked_count,
            updated_at: Some(Utc::now()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub tracked_count: usize,
    pub updated_at: Option<DateTime<Utc>>,
}

impl LeaderboardEntry {
    pub fn from_summary(user_id: &str, summary: LeaderboardSummary) -> Self {
        LeaderboardEntry {
            user_id: user_id.to_string(),
            display_name: normalize_display_name(Some(&summary.display_name)),
            photo_url: summary.photo_url,
            tracked_count: summary.tracked_count,
            updated_at: summary.updated_at,
        }
    }
}

/// Live state of a leaderboard subscription
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LeaderboardState {
    #[default]
    Loading,
    Ready(Vec<LeaderboardEntry>),
    Failed(String),
}

/// A live leaderboard feed. Dropping it ends the subscription.
pub struct LeaderboardWatch {
    pub rx: watch::Receiver<LeaderboardState>,
    _guard: Option<Box<dyn Send>>,
}

impl LeaderboardWatch {
    pub fn new(rx: watch::Receiver<LeaderboardState>) -> Self {
        LeaderboardWatch { rx, _guard: None }
    }

    fn with_guard(rx: watch::Receiver<LeaderboardState>, guard: Box<dyn Send>) -> Self {
        LeaderboardWatch {
            rx,
            _guard: Some(guard),
        }
    }
}

/// Order by tracked count, highest first, and keep the top `limit`.
pub fn rank_entries(mut entries: Vec<LeaderboardEntry>, limit: usize) -> Vec<LeaderboardEntry> {
    entries.sort_by(|a, b| {
        b.tracked_count
            .cmp(&a.tracked_count)
            .then_with(|| collate(&a.display_name, &b.display_name))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    entries.truncate(limit);
    entries
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// The user's remote tracking map; an absent document is empty.
    async fn fetch_tracked(&self, user_id: &str) -> Result<TrackingMap, SyncError>;
    async fn write_tracked(&self, user_id: &str, ids: &[String]) -> Result<(), SyncError>;
    async fn write_summary(&self, user_id: &str, summary: &LeaderboardSummary) -> Result<(), SyncError>;
    /// Top `limit` users by tracked count, kept current as summaries change.
    fn watch_leaderboard(&self, limit: usize) -> Result<LeaderboardWatch, SyncError>;
}

// ---------------------------------------------------------------------------
// Directory-backed store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DirRemoteStore {
    root: PathBuf,
}

fn check_user_id(user_id: &str) -> Result<(), SyncError> {
    if user_id.is_empty() || user_id.starts_with('.') || user_id.contains(['/', '\\']) {
        return Err(SyncError::InvalidUser(user_id.to_string()));
    }
    Ok(())
}

impl DirRemoteStore {
    pub fn new(root: &Path) -> Self {
        DirRemoteStore {
            root: root.to_path_buf(),
        }
    }

    fn document_path(&self, collection: &str, user_id: &str) -> PathBuf {
        self.root.join(collection).join(format!("{user_id}.json"))
    }

    /// Serialize `value` into a collection document under the store lock.
    async fn write_document<T: Serialize + Sync>(
        &self,
        collection: &'static str,
        user_id: &str,
        value: &T,
    ) -> Result<(), SyncError> {
        let write_error = |source: BoxError| SyncError::Write {
            user_id: user_id.to_string(),
            document: collection,
            source,
        };
        check_user_id(user_id)?;
        let json = serde_json::to_string_pretty(value).map_err(|e| write_error(e.into()))?;
        let root = self.root.clone();
        let path = self.document_path(collection, user_id);
        tokio::task::spawn_blocking(move || -> Result<(), BoxError> {
            let _lock = DirLock::acquire_default(&root)?;
            atomic_write(&path, json.as_bytes())?;
            Ok(())
        })
        .await
        .map_err(|e| write_error(e.into()))?
        .map_err(write_error)
    }
}

/// Read every summary in the leaderboard collection, skipping unreadable ones.
pub fn read_leaderboard(dir: &Path, limit: usize) -> Result<Vec<LeaderboardEntry>, std::io::Error> {
    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut entries = Vec::new();
    for entry in read_dir.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(user_id) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let summary = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str::<LeaderboardSummary>(&text).map_err(|e| e.to_string()));
        match summary {
            Ok(summary) => entries.push(LeaderboardEntry::from_summary(user_id, summary)),
            Err(e) => debug!(path = %path.display(), error = %e, "skipping leaderboard document"),
        }
    }
    Ok(rank_entries(entries, limit))
}

fn leaderboard_state(dir: &Path, limit: usize) -> LeaderboardState {
    match read_leaderboard(dir, limit) {
        Ok(entries) => LeaderboardState::Ready(entries),
        Err(e) => {
            warn!(error = %e, "could not read leaderboard");
            LeaderboardState::Failed(e.to_string())
        }
    }
}

#[async_trait]
impl RemoteStore for DirRemoteStore {
    async fn fetch_tracked(&self, user_id: &str) -> Result<TrackingMap, SyncError> {
        check_user_id(user_id)?;
        let path = self.document_path(TRACKING_COLLECTION, user_id);
        let fetch_error = |source: BoxError| SyncError::Fetch {
            user_id: user_id.to_string(),
            source,
        };
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(TrackingMap::new()),
            Err(e) => return Err(fetch_error(e.into())),
        };
        let doc: TrackingDocument = serde_json::from_str(&text).map_err(|e| fetch_error(e.into()))?;
        Ok(doc
            .tracked_problem_ids
            .into_iter()
            .map(|id| (id, true))
            .collect())
    }

    async fn write_tracked(&self, user_id: &str, ids: &[String]) -> Result<(), SyncError> {
        let doc = TrackingDocument {
            tracked_problem_ids: ids.to_vec(),
            updated_at: Some(Utc::now()),
        };
        self.write_document(TRACKING_COLLECTION, user_id, &doc).await
    }

    async fn write_summary(&self, user_id: &str, summary: &LeaderboardSummary) -> Result<(), SyncError> {
        self.write_document(LEADERBOARD_COLLECTION, user_id, summary).await
    }

    fn watch_leaderboard(&self, limit: usize) -> Result<LeaderboardWatch, SyncError> {
        let dir = self.root.join(LEADERBOARD_COLLECTION);
        fs::create_dir_all(&dir).map_err(|e| SyncError::Watch(e.to_string()))?;

        let (tx, rx) = watch::channel(leaderboard_state(&dir, limit));
        let watched = dir.clone();
        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let event = match result {
                    Ok(e) => e,
                    Err(e) => {
                        tx.send_replace(LeaderboardState::Failed(e.to_string()));
                        return;
                    }
                };
                if !matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) {
                    return;
                }
                let relevant = event
                    .paths
                    .iter()
                    .any(|p| p.extension().and_then(|e| e.to_str()) == Some("json"));
                if relevant {
                    tx.send_replace(leaderboard_state(&watched, limit));
                }
            },
            Config::default(),
        )
        .map_err(|e| SyncError::Watch(e.to_string()))?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| SyncError::Watch(e.to_string()))?;

        Ok(LeaderboardWatch::with_guard(rx, Box::new(watcher)))
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// A recorded call to the in-memory store
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Fetch(String),
    WriteTracked(String, Vec<String>),
    WriteSummary(String, usize),
}

/// Remote store held in memory. Records calls and can be told to fail.
#[derive(Debug)]
pub struct MemoryRemoteStore {
    tracked: Mutex<std::collections::HashMap<String, Vec<String>>>,
    summaries: Mutex<std::collections::HashMap<String, LeaderboardSummary>>,
    calls: Mutex<Vec<RemoteCall>>,
    fail_fetch: bool,
    fail_summary: bool,
    board: watch::Sender<LeaderboardState>,
    board_limit: Mutex<usize>,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        let (board, _) = watch::channel(LeaderboardState::Ready(Vec::new()));
        MemoryRemoteStore {
            tracked: Mutex::new(Default::default()),
            summaries: Mutex::new(Default::default()),
            calls: Mutex::new(Vec::new()),
            fail_fetch: false,
            fail_summary: false,
            board,
            board_limit: Mutex::new(LEADERBOARD_LIMIT),
        }
    }

    pub fn with_tracked(self, user_id: &str, ids: &[&str]) -> Self {
        self.tracked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id.to_string(), ids.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_fetch_failure(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    pub fn with_summary_failure(mut self) -> Self {
        self.fail_summary = true;
        self
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn tracked_ids(&self, user_id: &str) -> Option<Vec<String>> {
        self.tracked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(user_id)
            .cloned()
    }

    pub fn summary(&self, user_id: &str) -> Option<LeaderboardSummary> {
        self.summaries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(user_id)
            .cloned()
    }

    fn record(&self, call: RemoteCall) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }

    fn publish_board(&self) {
        let limit = *self.board_limit.lock().unwrap_or_else(|e| e.into_inner());
        let entries = self
            .summaries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(uid, s)| LeaderboardEntry::from_summary(uid, s.clone()))
            .collect();
        self.board
            .send_replace(LeaderboardState::Ready(rank_entries(entries, limit)));
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch_tracked(&self, user_id: &str) -> Result<TrackingMap, SyncError> {
        self.record(RemoteCall::Fetch(user_id.to_string()));
        if self.fail_fetch {
            return Err(SyncError::Fetch {
                user_id: user_id.to_string(),
                source: "remote unavailable".into(),
            });
        }
        Ok(self
            .tracked_ids(user_id)
            .unwrap_or_default()
            .into_iter()
            .map(|id| (id, true))
            .collect())
    }

    async fn write_tracked(&self, user_id: &str, ids: &[String]) -> Result<(), SyncError> {
        self.record(RemoteCall::WriteTracked(user_id.to_string(), ids.to_vec()));
        self.tracked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id.to_string(), ids.to_vec());
        Ok(())
    }

    async fn write_summary(&self, user_id: &str, summary: &LeaderboardSummary) -> Result<(), SyncError> {
        self.record(RemoteCall::WriteSummary(user_id.to_string(), summary.tracked_count));
        if self.fail_summary {
            return Err(SyncError::Write {
                user_id: user_id.to_string(),
                document: LEADERBOARD_COLLECTION,
                source: "permission denied".into(),
            });
        }
        self.summaries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id.to_string(), summary.clone());
        self.publish_board();
        Ok(())
    }

    fn watch_leaderboard(&self, limit: usize) -> Result<LeaderboardWatch, SyncError> {
        *self.board_limit.lock().unwrap_or_else(|e| e.into_inner()) = limit;
        self.publish_board();
        Ok(LeaderboardWatch::new(self.board.subscribe()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tempfile::TempDir;

    fn entry(user_id: &str, name: &str, count: usize) -> LeaderboardEntry {
        LeaderboardEntry {
            user_id: user_id.into(),
            display_name: name.into(),
            photo_url: None,
            tracked_count: count,
            updated_at: None,
        }
    }

    #[test]
    fn ranking_orders_by_count_and_truncates() {
        let ranked = rank_entries(
            vec![entry("a", "Ann", 3), entry("b", "Bo", 9), entry("c", "Cy", 3), entry("d", "Di", 0)],
            3,
        );
        let ids: Vec<&str> = ranked.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn dir_store_round_trips_tracking() {
        let tmp = TempDir::new().unwrap();
        let store = DirRemoteStore::new(tmp.path());
        assert!(store.fetch_tracked("ada").await.unwrap().is_empty());

        store
            .write_tracked("ada", &["l/one".to_string(), "l/two".to_string()])
            .await
            .unwrap();
        let fetched = store.fetch_tracked("ada").await.unwrap();
        assert_eq!(fetched.keys().cloned().collect::<Vec<_>>(), vec!["l/one", "l/two"]);

        let raw = fs::read_to_string(tmp.path().join("userTracking/ada.json")).unwrap();
        assert!(raw.contains("trackedProblemIds"));
    }

    #[tokio::test]
    async fn dir_store_rejects_path_like_ids() {
        let tmp = TempDir::new().unwrap();
        let store = DirRemoteStore::new(tmp.path());
        let err = store.write_tracked("../escape", &[]).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidUser(_)));
    }

    #[tokio::test]
    async fn dir_store_fetch_reports_corrupt_document() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join(TRACKING_COLLECTION)).unwrap();
        fs::write(tmp.path().join("userTracking/ada.json"), "[oops").unwrap();
        let store = DirRemoteStore::new(tmp.path());
        assert!(matches!(
            store.fetch_tracked("ada").await,
            Err(SyncError::Fetch { .. })
        ));
    }

    #[tokio::test]
    async fn leaderboard_reads_summaries() {
        let tmp = TempDir::new().unwrap();
        let store = DirRemoteStore::new(tmp.path());
        let ada = Identity {
            id: "ada".into(),
            display_name: Some("Ada".into()),
            photo: None,
        };
        store.write_summary("ada", &LeaderboardSummary::new(&ada, 4)).await.unwrap();
        store
            .write_summary("bob", &LeaderboardSummary::new(&Identity::new("bob"), 7))
            .await
            .unwrap();
        fs::write(tmp.path().join("leaderboard/junk.json"), "nope").unwrap();

        let feed = store.watch_leaderboard(LEADERBOARD_LIMIT).unwrap();
        let LeaderboardState::Ready(entries) = feed.rx.borrow().clone() else {
            panic!("leaderboard not ready");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].user_id, "bob");
        assert_eq!(entries[0].display_name, crate::io::auth::DEFAULT_DISPLAY_NAME);
        assert_eq!(entries[1].tracked_count, 4);
    }

    #[tokio::test]
    async fn leaderboard_watch_sees_new_summaries() {
        let tmp = TempDir::new().unwrap();
        let store = DirRemoteStore::new(tmp.path());
        let mut feed = store.watch_leaderboard(LEADERBOARD_LIMIT).unwrap();
        assert_eq!(*feed.rx.borrow_and_update(), LeaderboardState::Ready(Vec::new()));

        store
            .write_summary("ada", &LeaderboardSummary::new(&Identity::new("ada"), 2))
            .await
            .unwrap();

        let changed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                feed.rx.changed().await.unwrap();
                if let LeaderboardState::Ready(entries) = &*feed.rx.borrow_and_update()
                    && !entries.is_empty()
                {
                    return entries[0].tracked_count;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(changed, 2);
    }

    #[tokio::test]
    async fn memory_store_records_calls() {
        let store = MemoryRemoteStore::new().with_tracked("ada", &["x"]);
        let fetched = store.fetch_tracked("ada").await.unwrap();
        assert_eq!(fetched.len(), 1);
        store.write_tracked("ada", &["x".into(), "y".into()]).await.unwrap();
        assert_eq!(
            store.calls(),
            vec![
                RemoteCall::Fetch("ada".into()),
                RemoteCall::WriteTracked("ada".into(), vec!["x".into(), "y".into()]),
            ]
        );
    }
}
