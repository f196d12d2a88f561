use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;

use crate::io::remote::{LEADERBOARD_LIMIT, LeaderboardEntry, LeaderboardState, LeaderboardWatch, RemoteStore};

/// Number of entries the dashboard shows
pub const DISPLAY_LIMIT: usize = 8;

/// Subscription holder for the live leaderboard.
///
/// `init` subscribes once; repeated calls are no-ops. `dispose` drops the
/// subscription and resets to `Loading`.
pub struct Leaderboard {
    remote: Option<Arc<dyn RemoteStore>>,
    limit: usize,
    feed: Option<LeaderboardWatch>,
    state: LeaderboardState,
}

impl Leaderboard {
    pub fn new(remote: Option<Arc<dyn RemoteStore>>) -> Self {
        Leaderboard {
            remote,
            limit: LEADERBOARD_LIMIT,
            feed: None,
            state: LeaderboardState::Loading,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.feed.is_some()
    }

    pub fn init(&mut self) {
        if self.feed.is_some() {
            return;
        }
        let Some(remote) = &self.remote else {
            self.state = LeaderboardState::Failed("no remote store configured".into());
            return;
        };
        self.state = LeaderboardState::Loading;
        match remote.watch_leaderboard(self.limit) {
            Ok(feed) => self.feed = Some(feed),
            Err(e) => {
                warn!(error = %e, "could not subscribe to leaderboard");
                self.state = LeaderboardState::Failed(e.to_string());
            }
        }
        self.poll();
    }

    pub fn dispose(&mut self) {
        self.feed = None;
        self.state = LeaderboardState::Loading;
    }

    /// Pull the latest published state. Returns true when it changed.
    pub fn poll(&mut self) -> bool {
        let Some(feed) = &mut self.feed else {
            return false;
        };
        let changed = feed.rx.has_changed().unwrap_or(false);
        let latest = feed.rx.borrow_and_update().clone();
        let differs = latest != self.state;
        self.state = latest;
        changed || differs
    }

    pub fn state(&self) -> &LeaderboardState {
        &self.state
    }

    /// Entries worth showing: non-zero counts, top `DISPLAY_LIMIT`.
    pub fn visible_entries(&self) -> Vec<&LeaderboardEntry> {
        match &self.state {
            LeaderboardState::Ready(entries) => entries
                .iter()
                .filter(|e| e.tracked_count > 0)
                .take(DISPLAY_LIMIT)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// A receiver for callers that want to await changes themselves
    pub fn receiver(&self) -> Option<watch::Receiver<LeaderboardState>> {
        self.feed.as_ref().map(|f| f.rx.clone())
    }
}
