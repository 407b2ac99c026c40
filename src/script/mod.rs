//! Script assembly
//!
//! Migration identity plus the forward and reverse script assemblers.

mod assembler;
mod header;
mod writer;

pub use assembler::{ReverseScriptAssembler, ScriptAssembler};
pub use header::{compute_checksum, summary_token, MigrationId};
pub use writer::is_transaction_check;
