//! Change record operations
//!
//! Classification and description helpers shared by ordering, synthesis
//! and script headers.

use crate::change::{ChangeRecord, ChangeType, ObjectType};
use crate::error::{validation_error, MigrateResult};

impl ChangeRecord {
    /// Get a human-readable description of the change
    pub fn description(&self) -> String {
        if let Some(rename) = self.rename() {
            return match self.table() {
                Some(table) if rename.rename_kind.is_table_scoped() => format!(
                    "Rename {} {} to {} on {}.{}",
                    self.object_type.label(),
                    rename.old_name,
                    self.current_name(),
                    self.schema,
                    table
                ),
                _ => format!(
                    "Rename {} {}.{} to {}",
                    self.object_type.label(),
                    self.schema,
                    rename.old_name,
                    self.current_name()
                ),
            };
        }

        let verb = match self.change_type {
            ChangeType::Added => "Add",
            ChangeType::Deleted => "Drop",
            ChangeType::Modified => "Modify",
        };

        match (self.object_type, self.table()) {
            (ObjectType::Column, Some(table)) => format!(
                "{} column {} on {}.{}",
                verb,
                self.column().unwrap_or(&self.object_name),
                self.schema,
                table
            ),
            (ObjectType::Index | ObjectType::Constraint, Some(table)) => format!(
                "{} {} {} on {}.{}",
                verb,
                self.object_type.label(),
                self.object_name,
                self.schema,
                table
            ),
            _ => format!(
                "{} {} {}.{}",
                verb,
                self.object_type.label(),
                self.schema,
                self.object_name
            ),
        }
    }

    /// Get the target table for this change
    pub fn target_table(&self) -> Option<(String, String)> {
        match self.object_type {
            ObjectType::Table => Some((self.schema.clone(), self.object_name.clone())),
            ObjectType::Column | ObjectType::Index | ObjectType::Constraint => self
                .table()
                .map(|t| (self.schema.clone(), t.to_string())),
            _ => None,
        }
    }

    /// Check if this is a destructive change (data is lost when it runs)
    pub fn is_destructive(&self) -> bool {
        !self.is_rename()
            && self.change_type == ChangeType::Deleted
            && matches!(self.object_type, ObjectType::Table | ObjectType::Column)
    }

    /// A DEFAULT constraint: definition mentions DEFAULT and is neither a
    /// primary key nor a foreign key.
    pub fn is_default_constraint(&self) -> bool {
        if self.object_type != ObjectType::Constraint {
            return false;
        }
        match self.definition() {
            Some(def) => {
                let upper = def.to_uppercase();
                upper.contains("DEFAULT")
                    && !upper.contains("PRIMARY KEY")
                    && !upper.contains("FOREIGN KEY")
            }
            None => false,
        }
    }

    /// A foreign key constraint, by `FK_` naming convention or definition
    pub fn is_foreign_key(&self) -> bool {
        if self.object_type != ObjectType::Constraint {
            return false;
        }
        let by_name = self
            .object_name
            .trim_start_matches('[')
            .get(..3)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("FK_"));
        by_name
            || self
                .definition()
                .is_some_and(|def| def.to_uppercase().contains("FOREIGN KEY"))
    }

    /// Check the structural invariants of the record
    pub fn validate(&self) -> MigrateResult<()> {
        if self.schema.trim().is_empty() {
            return Err(validation_error(format!(
                "{} record '{}' has no schema",
                self.object_type.label(),
                self.object_name
            )));
        }
        if self.object_name.trim().is_empty() {
            return Err(validation_error(format!(
                "{} record in schema '{}' has no object name",
                self.object_type.label(),
                self.schema
            )));
        }

        let needs_table = matches!(
            self.object_type,
            ObjectType::Column | ObjectType::Index | ObjectType::Constraint
        );
        if needs_table && self.table().is_none() {
            return Err(validation_error(format!(
                "{} record '{}.{}' has no table name",
                self.object_type.label(),
                self.schema,
                self.object_name
            )));
        }

        if self.is_rename() {
            return Ok(());
        }

        match self.change_type {
            ChangeType::Added if self.old_def().is_some() => Err(validation_error(format!(
                "Added record '{}' carries an old definition",
                self.description()
            ))),
            ChangeType::Deleted if self.new_def().is_some() => Err(validation_error(format!(
                "Deleted record '{}' carries a new definition",
                self.description()
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::change::*;

    fn constraint(name: &str, def: &str) -> ChangeRecord {
        ChangeRecord::new(ObjectType::Constraint, ChangeType::Added, "dbo", name)
            .with_table("Orders")
            .with_new_definition(def)
    }

    #[test]
    fn test_default_constraint_detection() {
        let df = constraint(
            "DF_Orders_Status",
            "ALTER TABLE [dbo].[Orders] ADD CONSTRAINT [DF_Orders_Status] DEFAULT ('new') FOR [Status]",
        );
        let pk = constraint(
            "PK_Orders",
            "ALTER TABLE [dbo].[Orders] ADD CONSTRAINT [PK_Orders] PRIMARY KEY CLUSTERED ([Id])",
        );

        assert!(df.is_default_constraint());
        assert!(!pk.is_default_constraint());
    }

    #[test]
    fn test_foreign_key_detection() {
        let by_name = constraint("fk_orders_users", "ALTER TABLE x ADD CONSTRAINT y CHECK (1=1)");
        let by_def = constraint(
            "Orders_User",
            "ALTER TABLE [dbo].[Orders] ADD CONSTRAINT [Orders_User] FOREIGN KEY ([UserId]) REFERENCES [dbo].[Users] ([Id])",
        );
        let check = constraint("CK_Orders_Total", "ALTER TABLE x ADD CONSTRAINT y CHECK (Total > 0)");

        assert!(by_name.is_foreign_key());
        assert!(by_def.is_foreign_key());
        assert!(!check.is_foreign_key());
    }

    #[test]
    fn test_validate_column_requires_table() {
        let column = ChangeRecord::new(ObjectType::Column, ChangeType::Added, "dbo", "Email")
            .with_new_definition("[Email] NVARCHAR(100) NULL");

        assert!(column.validate().is_err());
        assert!(column.with_table("Users").validate().is_ok());
    }

    #[test]
    fn test_description() {
        let drop = ChangeRecord::new(ObjectType::Table, ChangeType::Deleted, "dbo", "Legacy");
        assert_eq!(drop.description(), "Drop table dbo.Legacy");
        assert!(drop.is_destructive());

        let rename = ChangeRecord::new(ObjectType::Index, ChangeType::Modified, "dbo", "IX_New")
            .with_table("Orders")
            .with_rename(RenameInfo::new("IX_Old", RenameKind::Index));
        assert_eq!(rename.description(), "Rename index IX_Old to IX_New on dbo.Orders");
        assert!(!rename.is_destructive());
    }
}
