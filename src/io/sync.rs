//! Switches the tracking ledger between local and remote persistence as the
//! signed-in identity changes.
//!
//! On sign-in the remote progress wins when it has any entries; otherwise the
//! device's local progress is pushed up to seed it. A remote that cannot be
//! reached leaves the session in local mode with local progress intact.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::io::auth::Identity;
use crate::io::ledger::{LedgerBackend, LocalBackend, RemoteBackend, TrackingLedger, TrackingMap};
use crate::io::local_store::LocalStore;
use crate::io::remote::RemoteStore;

/// What a reconciliation run did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Signed out: local progress loaded
    Local { tracked: usize },
    /// Remote progress was non-empty and replaced local state
    RemoteAdopted { tracked: usize },
    /// Remote was empty; local progress was pushed to it
    Bootstrapped { tracked: usize },
    /// Signed in, but no remote store is reachable; progress stays local
    RemoteUnavailable { tracked: usize },
    /// A newer identity change took over before this run committed
    Cancelled,
}

pub struct SyncCoordinator {
    local: Arc<dyn LocalStore>,
    remote: Option<Arc<dyn RemoteStore>>,
    ledger: Arc<TrackingLedger>,
    current: Mutex<Option<CancellationToken>>,
}

impl SyncCoordinator {
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Option<Arc<dyn RemoteStore>>,
        ledger: Arc<TrackingLedger>,
    ) -> Self {
        SyncCoordinator {
            local,
            remote,
            ledger,
            current: Mutex::new(None),
        }
    }

    /// Cancel the run in progress, if any, and start a new one. The cancel
    /// happens under the same lock `commit` holds.
    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = current.replace(token.clone()) {
            previous.cancel();
        }
        token
    }

    /// Run `install` unless a newer run has started. Tokens are only cancelled
    /// by `begin` while it holds `current`, so an uncancelled token is still
    /// the current one for as long as the guard lives.
    fn commit(
        &self,
        token: &CancellationToken,
        outcome: SyncOutcome,
        install: impl FnOnce(&TrackingLedger),
    ) -> SyncOutcome {
        let _current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if token.is_cancelled() {
            debug!("superseded by a newer identity change; discarding");
            return SyncOutcome::Cancelled;
        }
        install(&self.ledger);
        outcome
    }

    async fn load_local(&self) -> TrackingMap {
        let local = Arc::clone(&self.local);
        match tokio::task::spawn_blocking(move || local.load()).await {
            Ok(map) => map,
            Err(e) => {
                error!(error = %e, "local load task failed");
                TrackingMap::new()
            }
        }
    }

    fn local_backend(&self) -> Arc<dyn LedgerBackend> {
        Arc::new(LocalBackend::new(Arc::clone(&self.local)))
    }

    /// Reconcile the ledger for a new identity (`None` = signed out).
    pub async fn on_identity_change(&self, identity: Option<&Identity>) -> SyncOutcome {
        let token = self.begin();
        match identity {
            None => self.use_local(&token).await,
            Some(identity) => self.sign_in(identity, &token).await,
        }
    }

    async fn use_local(&self, token: &CancellationToken) -> SyncOutcome {
        // Cache writes of the previous session land before the reload.
        self.ledger.flush().await;
        let local_map = self.load_local().await;
        let tracked = local_map.len();
        let backend = self.local_backend();
        self.commit(token, SyncOutcome::Local { tracked }, |ledger| {
            ledger.install(backend, local_map, None);
            debug!(tracked, "using local progress");
        })
    }

    async fn sign_in(&self, identity: &Identity, token: &CancellationToken) -> SyncOutcome {
        let local_map = self.load_local().await;
        let Some(remote) = &self.remote else {
            warn!(user = %identity.id, "no remote store configured; progress stays local");
            return self.fall_back(token, local_map);
        };

        let fetched = tokio::select! {
            _ = token.cancelled() => return SyncOutcome::Cancelled,
            fetched = remote.fetch_tracked(&identity.id) => fetched,
        };
        let remote_map = match fetched {
            Ok(map) => map,
            Err(e) => {
                error!(user = %identity.id, error = %e, "remote sync failed; keeping local progress");
                return self.fall_back(token, local_map);
            }
        };

        let backend: Arc<dyn LedgerBackend> = Arc::new(RemoteBackend::new(
            Arc::clone(&self.local),
            Arc::clone(remote),
            identity.clone(),
        ));
        if remote_map.is_empty() {
            let tracked = local_map.len();
            self.commit(token, SyncOutcome::Bootstrapped { tracked }, |ledger| {
                info!(user = %identity.id, tracked, "seeding remote progress from this device");
                ledger.install(Arc::clone(&backend), local_map, Some(backend));
            })
        } else {
            // The remote map is cached locally but not pushed back.
            let tracked = remote_map.len();
            let cache = self.local_backend();
            self.commit(token, SyncOutcome::RemoteAdopted { tracked }, |ledger| {
                info!(user = %identity.id, tracked, "adopting remote progress");
                ledger.install(backend, remote_map, Some(cache));
            })
        }
    }

    fn fall_back(&self, token: &CancellationToken, local_map: TrackingMap) -> SyncOutcome {
        let tracked = local_map.len();
        let backend = self.local_backend();
        self.commit(token, SyncOutcome::RemoteUnavailable { tracked }, |ledger| {
            ledger.install(backend, local_map, None);
        })
    }

    /// React to every identity change until the sender goes away. Each change
    /// runs as its own task so a newer one can cancel an older one.
    pub fn spawn(self: Arc<Self>, mut identities: watch::Receiver<Option<Identity>>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let identity = identities.borrow_and_update().clone();
                let coordinator = Arc::clone(&self);
                tokio::spawn(async move {
                    let outcome = coordinator.on_identity_change(identity.as_ref()).await;
                    debug!(?outcome, "tracking reconciled");
                });
                if identities.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}
