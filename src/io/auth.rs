//! Who is signed in.
//!
//! The provider only answers "which user, if any"; the credential exchange
//! behind it is out of scope. Identity changes are broadcast on a watch
//! channel, which is what drives the tracking ledger's mode switch.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::io::state::{read_ui_state, update_ui_state};
use crate::model::config::IdentityConfig;

/// Display name used when a user has none
pub const DEFAULT_DISPLAY_NAME: &str = "Anonymous contender";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub display_name: Option<String>,
    pub photo: Option<String>,
}

impl Identity {
    pub fn new(id: &str) -> Self {
        Identity {
            id: id.to_string(),
            display_name: None,
            photo: None,
        }
    }

    /// Trimmed display name, or the default when blank or missing.
    pub fn normalized_name(&self) -> String {
        normalize_display_name(self.display_name.as_deref())
    }
}

pub fn normalize_display_name(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => DEFAULT_DISPLAY_NAME.to_string(),
    }
}

/// Error type for identity operations
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("no identity profile configured (add an [identity] section to the config)")]
    NoProfile,
    #[error("sign-in rejected: {0}")]
    Rejected(String),
    #[error("could not record sign-in state: {0}")]
    State(#[from] std::io::Error),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Option<Identity>;
    /// Receives every identity change, starting from the current one
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;
    async fn sign_in(&self) -> Result<Identity, IdentityError>;
    async fn sign_out(&self) -> Result<(), IdentityError>;
}

/// Signs in as the profile from the config file. The signed-in flag lives in
/// the UI state file, so a session survives restarts.
pub struct ProfileIdentityProvider {
    profile: Option<IdentityConfig>,
    state_dir: Option<PathBuf>,
    tx: watch::Sender<Option<Identity>>,
}

impl ProfileIdentityProvider {
    /// Restore the session recorded in `state_dir`, if any.
    pub fn new(profile: Option<IdentityConfig>, state_dir: Option<PathBuf>) -> Self {
        let signed_in = state_dir
            .as_deref()
            .and_then(read_ui_state)
            .is_some_and(|state| state.signed_in);
        let current = profile
            .as_ref()
            .filter(|_| signed_in)
            .and_then(|p| identity_from_profile(p).ok());
        let (tx, _) = watch::channel(current);
        ProfileIdentityProvider {
            profile,
            state_dir,
            tx,
        }
    }

    fn record_signed_in(&self, signed_in: bool) -> Result<(), IdentityError> {
        if let Some(dir) = &self.state_dir {
            update_ui_state(dir, |state| state.signed_in = signed_in)?;
        }
        Ok(())
    }
}

fn identity_from_profile(profile: &IdentityConfig) -> Result<Identity, IdentityError> {
    let id = profile.id.trim();
    if id.is_empty() {
        return Err(IdentityError::Rejected("profile id is empty".into()));
    }
    if id.contains(['/', '\\']) || id.starts_with('.') {
        return Err(IdentityError::Rejected(format!("invalid profile id {id:?}")));
    }
    Ok(Identity {
        id: id.to_string(),
        display_name: profile.display_name.clone(),
        photo: profile.photo.clone(),
    })
}

#[async_trait]
impl IdentityProvider for ProfileIdentityProvider {
    fn current(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }

    async fn sign_in(&self) -> Result<Identity, IdentityError> {
        let profile = self.profile.as_ref().ok_or(IdentityError::NoProfile)?;
        let identity = identity_from_profile(profile)?;
        self.record_signed_in(true)?;
        info!(user = %identity.id, "signed in");
        self.tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        if let Err(e) = self.record_signed_in(false) {
            warn!(error = %e, "could not clear sign-in state");
        }
        if self.tx.send_replace(None).is_some() {
            info!("signed out");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn profile(id: &str) -> IdentityConfig {
        IdentityConfig {
            id: id.into(),
            display_name: Some("Ada".into()),
            photo: None,
        }
    }

    #[test]
    fn display_name_normalization() {
        assert_eq!(normalize_display_name(Some("  Ada ")), "Ada");
        assert_eq!(normalize_display_name(Some("   ")), DEFAULT_DISPLAY_NAME);
        assert_eq!(normalize_display_name(None), DEFAULT_DISPLAY_NAME);
    }

    #[tokio::test]
    async fn sign_in_without_profile_fails() {
        let provider = ProfileIdentityProvider::new(None, None);
        assert!(matches!(provider.sign_in().await, Err(IdentityError::NoProfile)));
        assert!(provider.current().is_none());
    }

    #[tokio::test]
    async fn blank_profile_id_is_rejected() {
        let provider = ProfileIdentityProvider::new(Some(profile("  ")), None);
        assert!(matches!(provider.sign_in().await, Err(IdentityError::Rejected(_))));
    }

    #[tokio::test]
    async fn sign_in_notifies_and_persists() {
        let tmp = TempDir::new().unwrap();
        let provider = ProfileIdentityProvider::new(Some(profile("ada")), Some(tmp.path().into()));
        let mut rx = provider.subscribe();
        assert!(rx.borrow_and_update().is_none());

        let identity = provider.sign_in().await.unwrap();
        assert_eq!(identity.id, "ada");
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref().map(|i| i.id.clone()), Some("ada".into()));

        // A new provider over the same state directory restores the session.
        let restored = ProfileIdentityProvider::new(Some(profile("ada")), Some(tmp.path().into()));
        assert_eq!(restored.current(), Some(identity));

        restored.sign_out().await.unwrap();
        assert!(restored.current().is_none());
        let fresh = ProfileIdentityProvider::new(Some(profile("ada")), Some(tmp.path().into()));
        assert!(fresh.current().is_none());
    }
}
