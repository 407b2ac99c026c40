//! Reverse DDL synthesizer
//!
//! Structural mirror of the forward synthesizer: each record is inverted
//! (Added <-> Deleted, definitions and rename names swapped) and emitted by
//! the same per-object rules. Two cases differ because the forward pass
//! folded a DEFAULT constraint into its column: the constraint has no name
//! of its own to drop, and the column can only be dropped after its
//! system-named default is gone.

use crate::change::{ChangeRecord, ChangeType, ObjectType};
use crate::synthesis::emitter::{Direction, Emitter};
use crate::synthesis::patterns::{drop_existing_default_sql, has_default, qualified, quote_ident};
use tracing::debug;

pub struct ReverseDdlSynthesizer;

impl ReverseDdlSynthesizer {
    /// Generate DDL undoing `record`, given the full forward batch
    pub fn generate(record: &ChangeRecord, batch: &[ChangeRecord]) -> String {
        debug!("Synthesizing reverse DDL: {}", record.description());

        if !record.is_rename() {
            let forward = Emitter::new(batch, Direction::Forward);
            match (record.object_type, record.change_type) {
                (ObjectType::Constraint, ChangeType::Added) => {
                    if let Some(column) = forward.inlining_column(record) {
                        return format!(
                            "-- Skipped: default constraint {} is dropped together with column {}.{}",
                            quote_ident(&record.object_name),
                            qualified(&record.schema, record.table().unwrap_or_default()),
                            quote_ident(&column)
                        );
                    }
                }
                (ObjectType::Column, ChangeType::Added) => {
                    let carries_default = forward.inline_default(record).is_some()
                        || record.new_def().is_some_and(has_default);
                    if let (true, Some(table), Some(column)) =
                        (carries_default, record.table(), record.column())
                    {
                        return format!(
                            "{}\nALTER TABLE {} DROP COLUMN {};",
                            drop_existing_default_sql(&record.schema, table, column),
                            qualified(&record.schema, table),
                            quote_ident(column)
                        );
                    }
                }
                _ => {}
            }
        }

        Emitter::new(batch, Direction::Reverse).emit(&record.inverted())
    }
}
