pub mod config;
pub mod keys;
pub mod selection;
pub mod table;

pub use config::TrackerConfig;
pub use selection::rank_candidates;
pub use table::{BlockPlan, HeaderTable, TransitionReport};
