//! Migration pipeline
//!
//! Change batch in, ordered and synthesized scripts out:
//!
//! 1. **Order**: bucket the batch so dependencies are dropped and created safely
//! 2. **Assemble**: synthesize per-record DDL into forward and reverse scripts
//! 3. **Persist**: write scripts, optionally split into per-object segments

mod dependency;
mod orchestrator;

pub use dependency::{Bucket, DependencyResolver};
pub use orchestrator::{MigrationArtifacts, MigrationPipeline, WrittenArtifacts};
