pub mod auth;
pub mod catalog;
pub mod config_io;
pub mod leaderboard;
pub mod ledger;
pub mod local_store;
pub mod lock;
pub mod remote;
pub mod session;
pub mod source;
pub mod state;
pub mod sync;
