//! Script simulation
//!
//! Replays generated scripts against an in-memory migration history.

mod dry_run;

pub use dry_run::{HistorySimulator, SimulationResult};
