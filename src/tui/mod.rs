pub mod app;
pub mod input;
pub mod render;
pub mod scheduler;
pub mod theme;
pub mod virtual_list;

pub use app::run;
