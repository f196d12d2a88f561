//! The in-memory record of completed problems.
//!
//! Mutations apply to the map immediately and each schedules one persist
//! call on the active backend. Persists run in the background in the order
//! they were scheduled; `flush` waits for all of them. Observers get every
//! published snapshot through a watch channel.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::io::auth::Identity;
use crate::io::local_store::LocalStore;
use crate::io::remote::{LeaderboardSummary, RemoteStore};

/// Identity key → completed. Only `true` entries are kept.
pub type TrackingMap = BTreeMap<String, bool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceMode {
    Local,
    Remote,
}

impl std::fmt::Display for PersistenceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceMode::Local => f.write_str("local"),
            PersistenceMode::Remote => f.write_str("remote"),
        }
    }
}

/// Where ledger snapshots are written. Failures are logged, never returned.
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    fn mode(&self) -> PersistenceMode;
    async fn persist(&self, map: &TrackingMap);
}

/// Tracked ids of a map, in key order
pub fn tracked_ids(map: &TrackingMap) -> Vec<String> {
    map.iter()
        .filter(|(_, done)| **done)
        .map(|(id, _)| id.clone())
        .collect()
}

async fn save_local(local: &Arc<dyn LocalStore>, map: &TrackingMap) {
    let local = Arc::clone(local);
    let map = map.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || local.save(&map)).await {
        error!(error = %e, "local save task failed");
    }
}

/// Device-only persistence
pub struct LocalBackend {
    local: Arc<dyn LocalStore>,
}

impl LocalBackend {
    pub fn new(local: Arc<dyn LocalStore>) -> Self {
        LocalBackend { local }
    }
}

#[async_trait]
impl LedgerBackend for LocalBackend {
    fn mode(&self) -> PersistenceMode {
        PersistenceMode::Local
    }

    async fn persist(&self, map: &TrackingMap) {
        save_local(&self.local, map).await;
    }
}

/// Signed-in persistence: the local store as a cache, the remote progress
/// document as the authority, plus the user's leaderboard summary.
pub struct RemoteBackend {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    identity: Identity,
}

impl RemoteBackend {
    pub fn new(local: Arc<dyn LocalStore>, remote: Arc<dyn RemoteStore>, identity: Identity) -> Self {
        RemoteBackend {
            local,
            remote,
            identity,
        }
    }
}

#[async_trait]
impl LedgerBackend for RemoteBackend {
    fn mode(&self) -> PersistenceMode {
        PersistenceMode::Remote
    }

    async fn persist(&self, map: &TrackingMap) {
        save_local(&self.local, map).await;

        let ids = tracked_ids(map);
        let summary = LeaderboardSummary::new(&self.identity, ids.len());
        let user_id = self.identity.id.as_str();
        let (progress, board) = tokio::join!(
            self.remote.write_tracked(user_id, &ids),
            self.remote.write_summary(user_id, &summary),
        );
        if let Err(e) = progress {
            warn!(user = user_id, error = %e, "remote progress write failed");
        }
        if let Err(e) = board {
            warn!(user = user_id, error = %e, "leaderboard summary write failed");
        }
    }
}

struct Inner {
    map: TrackingMap,
    backend: Arc<dyn LedgerBackend>,
    last_persist: Option<JoinHandle<()>>,
}

pub struct TrackingLedger {
    inner: Mutex<Inner>,
    tx: watch::Sender<Arc<TrackingMap>>,
}

impl TrackingLedger {
    pub fn new(backend: Arc<dyn LedgerBackend>) -> Self {
        let (tx, _) = watch::channel(Arc::new(TrackingMap::new()));
        TrackingLedger {
            inner: Mutex::new(Inner {
                map: TrackingMap::new(),
                backend,
                last_persist: None,
            }),
            tx,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `mutate`, publish the new snapshot and optionally schedule a persist.
    fn commit<R>(&self, persist: bool, mutate: impl FnOnce(&mut TrackingMap) -> R) -> R {
        let mut inner = self.lock();
        let result = mutate(&mut inner.map);
        inner.map.retain(|_, done| *done);
        let snapshot = Arc::new(inner.map.clone());
        self.tx.send_replace(Arc::clone(&snapshot));
        if persist {
            let backend = Arc::clone(&inner.backend);
            schedule_persist(&mut inner, backend, snapshot);
        }
        result
    }

    /// Flip the completed flag of `id`. Returns the new flag.
    pub fn toggle(&self, id: &str) -> bool {
        self.commit(true, |map| {
            if map.remove(id).is_some() {
                false
            } else {
                map.insert(id.to_string(), true);
                true
            }
        })
    }

    pub fn set(&self, id: &str, done: bool) {
        self.commit(true, |map| {
            if done {
                map.insert(id.to_string(), true);
            } else {
                map.remove(id);
            }
        });
    }

    pub fn clear(&self) {
        self.commit(true, |map| map.clear());
    }

    /// Swap in a whole map. Persists only when `persist_immediately` is set.
    pub fn replace(&self, map: TrackingMap, persist_immediately: bool) {
        self.commit(persist_immediately, |current| *current = map);
    }

    pub fn snapshot(&self) -> Arc<TrackingMap> {
        self.tx.borrow().clone()
    }

    pub fn is_tracked(&self, id: &str) -> bool {
        self.tx.borrow().get(id).copied().unwrap_or(false)
    }

    pub fn count(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn mode(&self) -> PersistenceMode {
        self.lock().backend.mode()
    }

    /// Swap in `map` and route later persists to `backend`, in one step so no
    /// mutation lands between the two. Persists already scheduled keep their
    /// original backend. When `write_through` is given, `map` is
    /// persisted through it on the persist chain ahead of any later persist.
    pub fn install(
        &self,
        backend: Arc<dyn LedgerBackend>,
        map: TrackingMap,
        write_through: Option<Arc<dyn LedgerBackend>>,
    ) {
        let mut inner = self.lock();
        inner.map = map;
        inner.map.retain(|_, done| *done);
        let snapshot = Arc::new(inner.map.clone());
        self.tx.send_replace(Arc::clone(&snapshot));
        if let Some(first) = write_through {
            schedule_persist(&mut inner, first, snapshot);
        }
        if inner.backend.mode() != backend.mode() {
            debug!(from = %inner.backend.mode(), to = %backend.mode(), "persistence mode changed");
        }
        inner.backend = backend;
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<TrackingMap>> {
        self.tx.subscribe()
    }

    /// Wait until every scheduled persist has finished.
    pub async fn flush(&self) {
        loop {
            let pending = self.lock().last_persist.take();
            let Some(handle) = pending else {
                break;
            };
            if let Err(e) = handle.await {
                error!(error = %e, "persist task failed");
            }
        }
    }
}

/// Chain a persist behind the previous one so writes land in order.
fn schedule_persist(inner: &mut Inner, backend: Arc<dyn LedgerBackend>, snapshot: Arc<TrackingMap>) {
    let runtime = match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle,
        Err(_) => {
            warn!("no async runtime; tracking change not persisted");
            return;
        }
    };
    let previous = inner.last_persist.take();
    inner.last_persist = Some(runtime.spawn(async move {
        if let Some(previous) = previous {
            let _ = previous.await;
        }
        backend.persist(&snapshot).await;
    }));
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::io::local_store::MemoryLocalStore;
    use crate::io::remote::{MemoryRemoteStore, RemoteCall};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    /// Backend that records every persisted snapshot
    #[derive(Default)]
    pub(crate) struct RecordingBackend {
        pub persisted: Mutex<Vec<TrackingMap>>,
        pub delay: Option<Duration>,
    }

    impl RecordingBackend {
        pub fn calls(&self) -> Vec<TrackingMap> {
            self.persisted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LedgerBackend for RecordingBackend {
        fn mode(&self) -> PersistenceMode {
            PersistenceMode::Local
        }

        async fn persist(&self, map: &TrackingMap) {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.persisted.lock().unwrap().push(map.clone());
        }
    }

    fn map(ids: &[&str]) -> TrackingMap {
        ids.iter().map(|id| (id.to_string(), true)).collect()
    }

    #[tokio::test]
    async fn toggle_twice_restores_map_with_two_persists() {
        let backend = Arc::new(RecordingBackend::default());
        let ledger = TrackingLedger::new(backend.clone());
        ledger.replace(map(&["a"]), false);
        let before = ledger.snapshot();

        assert!(ledger.toggle("b"));
        assert!(!ledger.toggle("b"));
        ledger.flush().await;

        assert_eq!(*ledger.snapshot(), *before);
        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], map(&["a", "b"]));
        assert_eq!(calls[1], map(&["a"]));
    }

    #[tokio::test]
    async fn persists_land_in_schedule_order() {
        let backend = Arc::new(RecordingBackend {
            delay: Some(Duration::from_millis(5)),
            ..Default::default()
        });
        let ledger = TrackingLedger::new(backend.clone());
        ledger.set("x", true);
        ledger.set("y", true);
        ledger.set("x", false);
        ledger.flush().await;

        assert_eq!(
            backend.calls(),
            vec![map(&["x"]), map(&["x", "y"]), map(&["y"])]
        );
    }

    #[tokio::test]
    async fn replace_without_persist_skips_backend() {
        let backend = Arc::new(RecordingBackend::default());
        let ledger = TrackingLedger::new(backend.clone());
        ledger.replace(map(&["a", "b"]), false);
        ledger.flush().await;
        assert!(backend.calls().is_empty());
        assert_eq!(ledger.count(), 2);

        ledger.replace(map(&["c"]), true);
        ledger.flush().await;
        assert_eq!(backend.calls(), vec![map(&["c"])]);
    }

    #[tokio::test]
    async fn false_entries_are_dropped() {
        let ledger = TrackingLedger::new(Arc::new(RecordingBackend::default()));
        let mut incoming = map(&["a"]);
        incoming.insert("b".into(), false);
        ledger.replace(incoming, false);
        assert!(ledger.is_tracked("a"));
        assert!(!ledger.is_tracked("b"));
        assert_eq!(ledger.count(), 1);
    }

    #[tokio::test]
    async fn observers_see_each_snapshot() {
        let ledger = TrackingLedger::new(Arc::new(RecordingBackend::default()));
        let mut rx = ledger.subscribe();
        let _ = rx.borrow_and_update();

        ledger.toggle("a");
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().contains_key("a"));

        ledger.clear();
        assert!(rx.borrow_and_update().is_empty());
        ledger.flush().await;
    }

    #[tokio::test]
    async fn remote_backend_writes_cache_progress_and_summary() {
        let local = Arc::new(MemoryLocalStore::default());
        let remote = Arc::new(MemoryRemoteStore::new());
        let identity = Identity {
            id: "ada".into(),
            display_name: Some("  ".into()),
            photo: Some("https://img/ada.png".into()),
        };
        let ledger = TrackingLedger::new(Arc::new(RemoteBackend::new(
            local.clone(),
            remote.clone(),
            identity,
        )));
        assert_eq!(ledger.mode(), PersistenceMode::Remote);

        ledger.toggle("l/one");
        ledger.flush().await;

        assert_eq!(local.load(), map(&["l/one"]));
        assert_eq!(remote.tracked_ids("ada"), Some(vec!["l/one".to_string()]));
        let summary = remote.summary("ada").unwrap();
        assert_eq!(summary.tracked_count, 1);
        assert_eq!(summary.display_name, crate::io::auth::DEFAULT_DISPLAY_NAME);
        assert_eq!(summary.photo_url.as_deref(), Some("https://img/ada.png"));
    }

    #[tokio::test]
    async fn summary_failure_keeps_ledger_state() {
        let local = Arc::new(MemoryLocalStore::default());
        let remote = Arc::new(MemoryRemoteStore::new().with_summary_failure());
        let ledger = TrackingLedger::new(Arc::new(RemoteBackend::new(
            local,
            remote.clone(),
            Identity::new("ada"),
        )));
        ledger.toggle("l/one");
        ledger.flush().await;

        assert!(ledger.is_tracked("l/one"));
        assert!(remote.calls().contains(&RemoteCall::WriteSummary("ada".into(), 1)));
        assert_eq!(remote.tracked_ids("ada"), Some(vec!["l/one".to_string()]));
    }

    #[test]
    fn mutation_without_runtime_still_updates_map() {
        let backend = Arc::new(RecordingBackend::default());
        let ledger = TrackingLedger::new(backend.clone());
        ledger.toggle("a");
        assert!(ledger.is_tracked("a"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn install_writes_cache_then_routes_to_new_backend() {
        let old = Arc::new(RecordingBackend::default());
        let cache = Arc::new(RecordingBackend::default());
        let next = Arc::new(RecordingBackend::default());
        let ledger = TrackingLedger::new(old.clone());

        ledger.install(next.clone(), map(&["b"]), Some(cache.clone()));
        ledger.set("c", true);
        ledger.flush().await;

        assert!(old.calls().is_empty());
        assert_eq!(cache.calls(), vec![map(&["b"])]);
        assert_eq!(next.calls(), vec![map(&["b", "c"])]);
        assert_eq!(*ledger.snapshot(), map(&["b", "c"]));
    }
}
