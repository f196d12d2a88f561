pub mod identity;
pub mod query;
pub mod stats;
