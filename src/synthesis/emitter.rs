//! Per-object DDL emission
//!
//! One emitter serves both directions. The reverse synthesizer feeds it
//! inverted records, and the emitter views the rest of the batch the same
//! way so sibling lookups (DEFAULT constraints for new NOT NULL columns)
//! keep working on the inverse.

use crate::change::{ChangeRecord, ChangeType, ObjectType};
use crate::synthesis::extended_property::ExtendedPropertyCall;
use crate::synthesis::patterns::{
    constraint_name, default_target_column, drop_existing_default_sql, extract_default_expression,
    has_default, has_not_null, normalize_alter_column, qualified, quote_ident, same_ident,
    splice_default, strip_terminator,
};
use crate::synthesis::rename::rename_sql;
use crate::synthesis::join_batches;
use std::borrow::Cow;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// A sibling DEFAULT constraint folded into a column's ADD statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineDefault {
    pub constraint_name: String,
    pub expression: String,
}

pub struct Emitter<'a> {
    batch: &'a [ChangeRecord],
    direction: Direction,
}

impl<'a> Emitter<'a> {
    pub fn new(batch: &'a [ChangeRecord], direction: Direction) -> Self {
        Self { batch, direction }
    }

    /// A batch record as this direction sees it
    fn view<'r>(&self, record: &'r ChangeRecord) -> Cow<'r, ChangeRecord> {
        match self.direction {
            Direction::Forward => Cow::Borrowed(record),
            Direction::Reverse => Cow::Owned(record.inverted()),
        }
    }

    /// Emit DDL for a record already expressed in this direction
    pub fn emit(&self, record: &ChangeRecord) -> String {
        if let Some(rename) = record.rename() {
            return rename_sql(record, rename);
        }

        match record.object_type {
            ObjectType::Table => self.table(record),
            ObjectType::Column => self.column(record),
            ObjectType::Index => self.index(record),
            ObjectType::Constraint => self.constraint(record),
            ObjectType::View
            | ObjectType::StoredProcedure
            | ObjectType::Function
            | ObjectType::Trigger => self.programmable(record),
            ObjectType::ExtendedProperty => self.extended_property(record),
        }
    }

    // =========================================================================
    // DEFAULT CONSTRAINT INLINING
    // =========================================================================

    /// The DEFAULT constraint to fold into a NOT NULL column being added:
    /// an Added default constraint on the same table named `DF_{Table}_{Column}`
    /// or targeting the column with `FOR [{Column}]`. Definitions without a
    /// parseable `FOR` clause match when they mention `[{Column}]`.
    pub fn inline_default(&self, column: &ChangeRecord) -> Option<InlineDefault> {
        if column.object_type != ObjectType::Column
            || column.change_type != ChangeType::Added
            || column.is_rename()
        {
            return None;
        }
        let definition = column.new_def()?;
        if !has_not_null(definition) || has_default(definition) {
            return None;
        }
        let table = column.table()?;
        let column_name = column.column()?;
        let conventional_name = format!("DF_{}_{}", table, column_name);
        let bracketed = format!("[{}]", column_name).to_uppercase();

        self.batch.iter().find_map(|candidate| {
            let sibling = self.view(candidate);
            let matches = sibling.object_type == ObjectType::Constraint
                && sibling.change_type == ChangeType::Added
                && !sibling.is_rename()
                && sibling.is_default_constraint()
                && same_ident(&sibling.schema, &column.schema)
                && sibling.table().is_some_and(|t| same_ident(t, table));
            if !matches {
                return None;
            }

            let sibling_def = sibling.new_def()?;
            let named = same_ident(&sibling.object_name, &conventional_name);
            let targets_column = match default_target_column(sibling_def) {
                Some(target) => same_ident(&target, column_name),
                None => sibling_def.to_uppercase().contains(&bracketed),
            };
            if !named && !targets_column {
                return None;
            }

            extract_default_expression(sibling_def).map(|expression| InlineDefault {
                constraint_name: sibling.object_name.clone(),
                expression,
            })
        })
    }

    /// Column a DEFAULT constraint is folded into, when it is
    pub fn inlining_column(&self, constraint: &ChangeRecord) -> Option<String> {
        if constraint.object_type != ObjectType::Constraint
            || constraint.change_type != ChangeType::Added
            || !constraint.is_default_constraint()
        {
            return None;
        }
        let table = constraint.table()?;

        self.batch.iter().find_map(|candidate| {
            let column = self.view(candidate);
            if column.object_type != ObjectType::Column
                || !same_ident(&column.schema, &constraint.schema)
                || !column.table().is_some_and(|t| same_ident(t, table))
            {
                return None;
            }
            self.inline_default(&column)
                .filter(|inline| same_ident(&inline.constraint_name, &constraint.object_name))
                .and_then(|_| column.column().map(str::to_string))
        })
    }

    // =========================================================================
    // OBJECT TYPES
    // =========================================================================

    fn table(&self, record: &ChangeRecord) -> String {
        let target = qualified(&record.schema, &record.object_name);
        match record.change_type {
            ChangeType::Added => verbatim(record.new_def(), record),
            ChangeType::Deleted => format!("DROP TABLE {};", target),
            ChangeType::Modified => format!(
                "-- Table {} modified: changes are expressed through column-level records",
                target
            ),
        }
    }

    fn column(&self, record: &ChangeRecord) -> String {
        let column = record.column().unwrap_or(&record.object_name);
        let Some(table) = record.table() else {
            return format!(
                "-- Column {}.{} skipped: owning table was not recorded",
                record.schema, column
            );
        };
        let target = qualified(&record.schema, table);

        match record.change_type {
            ChangeType::Added => {
                let Some(definition) = record.new_def() else {
                    return missing_definition(record);
                };
                let definition = match self.inline_default(record) {
                    Some(inline) => {
                        debug!(
                            "Inlining default {} into column {}.{}",
                            inline.constraint_name, target, column
                        );
                        splice_default(definition, &inline.expression)
                    }
                    None => strip_terminator(definition),
                };
                format!("ALTER TABLE {} ADD {};", target, definition)
            }
            ChangeType::Deleted => {
                format!("ALTER TABLE {} DROP COLUMN {};", target, quote_ident(column))
            }
            ChangeType::Modified => match record.new_def() {
                Some(definition) => format!(
                    "ALTER TABLE {} ALTER COLUMN {};",
                    target,
                    normalize_alter_column(definition)
                ),
                None => missing_definition(record),
            },
        }
    }

    fn index(&self, record: &ChangeRecord) -> String {
        let Some(table) = record.table() else {
            return format!(
                "-- Index {}.{} skipped: owning table was not recorded",
                record.schema, record.object_name
            );
        };
        let drop = format!(
            "DROP INDEX IF EXISTS {} ON {};",
            quote_ident(&record.object_name),
            qualified(&record.schema, table)
        );

        match record.change_type {
            ChangeType::Added => verbatim(record.new_def(), record),
            ChangeType::Deleted => drop,
            ChangeType::Modified => match record.new_def() {
                Some(definition) => format!("{}\n{}", drop, definition.trim()),
                None => missing_definition(record),
            },
        }
    }

    fn constraint(&self, record: &ChangeRecord) -> String {
        let Some(table) = record.table() else {
            return format!(
                "-- Constraint {}.{} skipped: owning table was not recorded",
                record.schema, record.object_name
            );
        };
        let target = qualified(&record.schema, table);

        match record.change_type {
            ChangeType::Added => {
                if let Some(column) = self.inlining_column(record) {
                    debug!("Skipping default constraint {} (inlined)", record.object_name);
                    return self.skip_marker(record, &target, &column);
                }
                let Some(definition) = record.new_def() else {
                    return missing_definition(record);
                };
                if record.is_default_constraint() {
                    self.replace_default(record, definition)
                } else {
                    definition.trim().to_string()
                }
            }
            ChangeType::Deleted => match self.existing_constraint_name(record) {
                Some(name) => format!(
                    "ALTER TABLE {} DROP CONSTRAINT {};",
                    target,
                    quote_ident(&name)
                ),
                None => format!(
                    "-- Could not resolve constraint name to drop on {}",
                    target
                ),
            },
            ChangeType::Modified => {
                let Some(definition) = record.new_def() else {
                    return missing_definition(record);
                };
                match self.existing_constraint_name(record) {
                    Some(name) => format!(
                        "ALTER TABLE {} DROP CONSTRAINT {};\n{}",
                        target,
                        quote_ident(&name),
                        definition.trim()
                    ),
                    None => format!(
                        "-- Could not resolve constraint name to drop on {}\n{}",
                        target,
                        definition.trim()
                    ),
                }
            }
        }
    }

    /// Name of the constraint as it exists before this change
    fn existing_constraint_name(&self, record: &ChangeRecord) -> Option<String> {
        record
            .old_def()
            .and_then(constraint_name)
            .or_else(|| Some(record.object_name.trim().to_string()))
            .filter(|name| !name.is_empty())
    }

    /// Drop whatever default is on the column (its name is unpredictable),
    /// then add the new one
    fn replace_default(&self, record: &ChangeRecord, definition: &str) -> String {
        let column = default_target_column(definition)
            .or_else(|| record.column_name.clone().filter(|c| !c.trim().is_empty()));
        match (column, record.table()) {
            (Some(column), Some(table)) => format!(
                "{}\n{}",
                drop_existing_default_sql(&record.schema, table, &column),
                definition.trim()
            ),
            _ => definition.trim().to_string(),
        }
    }

    fn skip_marker(&self, record: &ChangeRecord, target: &str, column: &str) -> String {
        let action = match self.direction {
            Direction::Forward => "applied inline with",
            Direction::Reverse => "restored inline with",
        };
        format!(
            "-- Skipped: default constraint {} is {} column {}.{}",
            quote_ident(&record.object_name),
            action,
            target,
            quote_ident(column)
        )
    }

    fn programmable(&self, record: &ChangeRecord) -> String {
        let Some(keyword) = record.object_type.drop_keyword() else {
            return format!(
                "-- Unsupported object type {:?} for {}",
                record.object_type,
                record.description()
            );
        };
        let drop = format!(
            "DROP {} {};",
            keyword,
            qualified(&record.schema, &record.object_name)
        );

        match record.change_type {
            ChangeType::Added => verbatim(record.new_def(), record),
            ChangeType::Deleted => drop,
            ChangeType::Modified => match record.new_def() {
                Some(definition) => join_batches(&[drop, definition.trim().to_string()]),
                None => missing_definition(record),
            },
        }
    }

    fn extended_property(&self, record: &ChangeRecord) -> String {
        match record.change_type {
            ChangeType::Added => verbatim(record.new_def(), record),
            ChangeType::Deleted => match record.old_def().and_then(ExtendedPropertyCall::parse) {
                Some(call) => call.drop_sql(),
                None => format!(
                    "-- Could not parse extended property {}.{} to drop it",
                    record.schema, record.object_name
                ),
            },
            ChangeType::Modified => match record.new_def().and_then(ExtendedPropertyCall::parse) {
                Some(call) => call.update_or_add_sql(),
                None => format!(
                    "-- Could not parse extended property {}.{} to update it",
                    record.schema, record.object_name
                ),
            },
        }
    }
}

fn verbatim(definition: Option<&str>, record: &ChangeRecord) -> String {
    match definition {
        Some(definition) => definition.trim().to_string(),
        None => missing_definition(record),
    }
}

fn missing_definition(record: &ChangeRecord) -> String {
    format!("-- No definition recorded for: {}", record.description())
}
