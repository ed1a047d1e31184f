pub mod analytics;
pub mod common;
pub mod tickets;

pub use crate::AppState;
