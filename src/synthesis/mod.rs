//! DDL synthesis
//!
//! Turns change records into T-SQL, forward and reverse.

mod emitter;
pub mod extended_property;
mod forward;
pub mod patterns;
mod rename;
mod reverse;

pub use extended_property::ExtendedPropertyCall;
pub use forward::ObjectDdlSynthesizer;
pub use reverse::ReverseDdlSynthesizer;

/// Batch separator understood by sqlcmd and SSMS
pub const BATCH_SEPARATOR: &str = "GO";

/// Join statements that must run in separate batches (e.g. a DROP VIEW
/// followed by a CREATE VIEW, which has to start its own batch)
pub fn join_batches(batches: &[String]) -> String {
    batches.join(&format!("\n{}\n", BATCH_SEPARATOR))
}
