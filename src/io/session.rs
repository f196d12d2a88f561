//! Wires the services together from a loaded config.
//!
//! Both the TUI and the CLI open a [`Session`]: one catalog over the data
//! directory, one ledger persisted to the state directory, an identity
//! provider and a sync coordinator that moves the ledger between local and
//! remote persistence.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::io::auth::{IdentityProvider, ProfileIdentityProvider};
use crate::io::catalog::CatalogStore;
use crate::io::config_io::{ConfigError, LoadedConfig};
use crate::io::ledger::{LocalBackend, TrackingLedger};
use crate::io::local_store::{FileLocalStore, LocalStore};
use crate::io::remote::{DirRemoteStore, RemoteStore};
use crate::io::source::{DirSource, ProblemSource, SourceError};
use crate::io::sync::{SyncCoordinator, SyncOutcome};
use crate::model::config::AppConfig;

/// Error type for opening a session
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not open problem data: {0}")]
    Source(#[from] SourceError),
}

pub struct Session {
    pub config: AppConfig,
    pub config_path: PathBuf,
    pub state_dir: PathBuf,
    pub catalog: Arc<CatalogStore>,
    pub local: Arc<dyn LocalStore>,
    pub remote: Option<Arc<dyn RemoteStore>>,
    pub ledger: Arc<TrackingLedger>,
    pub identity: Arc<dyn IdentityProvider>,
    pub sync: Arc<SyncCoordinator>,
}

/// Collaborators a session is built from. The file-backed ones come from
/// [`open_session`]; tests pass in-memory ones.
pub struct SessionParts {
    pub config: AppConfig,
    pub config_path: PathBuf,
    pub state_dir: PathBuf,
    pub source: Arc<dyn ProblemSource>,
    pub local: Arc<dyn LocalStore>,
    pub remote: Option<Arc<dyn RemoteStore>>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl Session {
    pub fn from_parts(parts: SessionParts) -> Self {
        let catalog = Arc::new(CatalogStore::new(parts.source));
        let ledger = Arc::new(TrackingLedger::new(Arc::new(LocalBackend::new(Arc::clone(
            &parts.local,
        )))));
        let sync = Arc::new(SyncCoordinator::new(
            Arc::clone(&parts.local),
            parts.remote.clone(),
            Arc::clone(&ledger),
        ));
        Session {
            config: parts.config,
            config_path: parts.config_path,
            state_dir: parts.state_dir,
            catalog,
            local: parts.local,
            remote: parts.remote,
            ledger,
            identity: parts.identity,
            sync,
        }
    }

    /// Load the ledger for whoever is signed in right now.
    pub async fn reconcile(&self) -> SyncOutcome {
        let identity = self.identity.current();
        self.sync.on_identity_change(identity.as_ref()).await
    }
}

/// Open the file-backed session described by `loaded`.
pub fn open_session(loaded: LoadedConfig) -> Result<Session, SessionError> {
    let state_dir = loaded.state_dir();
    let source = DirSource::open(loaded.data_dir())?;
    let remote: Option<Arc<dyn RemoteStore>> = loaded
        .remote_dir()
        .map(|dir| Arc::new(DirRemoteStore::new(dir)) as Arc<dyn RemoteStore>);
    debug!(
        data = %loaded.data_dir().display(),
        state = %state_dir.display(),
        remote = remote.is_some(),
        "opening session"
    );
    let identity = ProfileIdentityProvider::new(loaded.config.identity.clone(), Some(state_dir.clone()));
    Ok(Session::from_parts(SessionParts {
        source: Arc::new(source),
        local: Arc::new(FileLocalStore::new(&state_dir)),
        remote,
        identity: Arc::new(identity),
        state_dir,
        config_path: loaded.path,
        config: loaded.config,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::auth::IdentityError;
    use crate::io::ledger::{PersistenceMode, TrackingMap};
    use crate::io::local_store::MemoryLocalStore;
    use crate::io::remote::MemoryRemoteStore;
    use crate::io::source::MemorySource;
    use crate::model::config::IdentityConfig;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn parts(remote: Option<Arc<dyn RemoteStore>>, identity: ProfileIdentityProvider) -> SessionParts {
        let mut local = TrackingMap::new();
        local.insert("a::b::Two Sum::".into(), true);
        SessionParts {
            config: AppConfig::default(),
            config_path: PathBuf::from("prepdeck.toml"),
            state_dir: PathBuf::from("state"),
            source: Arc::new(MemorySource::new()),
            local: Arc::new(MemoryLocalStore::new(local)),
            remote,
            identity: Arc::new(identity),
        }
    }

    fn profile() -> Option<IdentityConfig> {
        Some(IdentityConfig {
            id: "ada".into(),
            display_name: None,
            photo: None,
        })
    }

    #[tokio::test]
    async fn reconcile_signed_out_loads_local() {
        let session = Session::from_parts(parts(None, ProfileIdentityProvider::new(profile(), None)));
        let outcome = session.reconcile().await;
        assert_eq!(outcome, SyncOutcome::Local { tracked: 1 });
        assert_eq!(session.ledger.count(), 1);
        assert_eq!(session.ledger.mode(), PersistenceMode::Local);
    }

    #[tokio::test]
    async fn reconcile_signed_in_bootstraps_remote() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let identity = ProfileIdentityProvider::new(profile(), None);
        identity.sign_in().await.unwrap();
        let session = Session::from_parts(parts(Some(remote.clone()), identity));

        let outcome = session.reconcile().await;
        assert_eq!(outcome, SyncOutcome::Bootstrapped { tracked: 1 });
        session.ledger.flush().await;
        assert_eq!(remote.tracked_ids("ada"), Some(vec!["a::b::Two Sum::".to_string()]));
    }

    #[tokio::test]
    async fn sign_in_without_profile_keeps_local() {
        let session = Session::from_parts(parts(None, ProfileIdentityProvider::new(None, None)));
        assert!(matches!(session.identity.sign_in().await, Err(IdentityError::NoProfile)));
        assert_eq!(session.reconcile().await, SyncOutcome::Local { tracked: 1 });
    }

    #[test]
    fn open_session_reads_data_dir() {
        let tmp = TempDir::new().unwrap();
        let company = tmp.path().join("data").join("Acme");
        fs::create_dir_all(&company).unwrap();
        fs::write(company.join("1. Thirty Days.json"), "[]").unwrap();
        let config_path = tmp.path().join("prepdeck.toml");
        fs::write(&config_path, "[storage]\nstate_dir = \"state\"\n").unwrap();

        let loaded = crate::io::config_io::load_config(Some(&config_path)).unwrap();
        let session = open_session(loaded).unwrap();
        assert_eq!(session.catalog.companies(), vec!["Acme".to_string()]);
        assert_eq!(session.state_dir, tmp.path().join("state"));
        assert!(session.remote.is_none());
    }

    #[test]
    fn open_session_missing_data_dir_fails() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("prepdeck.toml");
        fs::write(&config_path, "[data]\ndir = \"nowhere\"\n").unwrap();
        let loaded = crate::io::config_io::load_config(Some(&config_path)).unwrap();
        assert!(matches!(open_session(loaded), Err(SessionError::Source(_))));
    }
}
