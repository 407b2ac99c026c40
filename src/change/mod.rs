//! Change module - the unit every other component consumes
//!
//! Defines change records, their classification helpers and batch loading.

mod batch;
mod changes;
mod models;

pub use batch::{count_by_type, load_batch, parse_batch};
pub use models::*;
