//! SchemaFlow Migrate - SQL Server migration script synthesis
//!
//! Turns a batch of detected per-object schema changes into a
//! dependency-ordered, transactional, idempotent forward migration and its
//! manual rollback, and optionally splits either into per-object segments
//! indexed by a JSON manifest.
//!
//! - `change`: change records and batch loading
//! - `pipeline`: dependency ordering and the end-to-end pipeline
//! - `synthesis`: per-record forward and reverse DDL
//! - `script`: transactional script assembly with history bookkeeping
//! - `segment`: script segmentation and reconstruction
//! - `simulation`: in-memory replay against a migration history

pub mod change;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod script;
pub mod segment;
pub mod simulation;
pub mod synthesis;

pub use change::{ChangeRecord, ChangeType, ObjectType, RenameInfo, RenameKind};
pub use error::{MigrateResult, MigrationError};
pub use pipeline::{MigrationArtifacts, MigrationPipeline};
