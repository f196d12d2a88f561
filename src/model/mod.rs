pub mod config;
pub mod filter;
pub mod problem;

pub use config::*;
pub use filter::*;
pub use problem::*;
