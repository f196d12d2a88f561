pub mod collate;
pub mod unicode;
