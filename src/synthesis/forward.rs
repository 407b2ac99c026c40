//! Forward DDL synthesizer
//!
//! Generates the T-SQL that moves a database from the old schema revision
//! to the new one, one change record at a time.

use crate::change::ChangeRecord;
use crate::synthesis::emitter::{Direction, Emitter};
use tracing::debug;

pub struct ObjectDdlSynthesizer;

impl ObjectDdlSynthesizer {
    /// Generate forward DDL for `record`. `batch` is the full, immutable
    /// change batch, consulted for sibling DEFAULT constraints.
    pub fn generate(record: &ChangeRecord, batch: &[ChangeRecord]) -> String {
        debug!("Synthesizing forward DDL: {}", record.description());
        Emitter::new(batch, Direction::Forward).emit(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ChangeType, ObjectType, RenameInfo, RenameKind};
    use pretty_assertions::assert_eq;

    fn generate(record: &ChangeRecord) -> String {
        ObjectDdlSynthesizer::generate(record, std::slice::from_ref(record))
    }

    fn not_null_column_with_default() -> Vec<ChangeRecord> {
        vec![
            ChangeRecord::new(ObjectType::Column, ChangeType::Added, "dbo", "C")
                .with_table("T")
                .with_column("C")
                .with_new_definition("[C] INT NOT NULL"),
            ChangeRecord::new(ObjectType::Constraint, ChangeType::Added, "dbo", "DF_T_C")
                .with_table("T")
                .with_new_definition("ALTER TABLE [dbo].[T] ADD CONSTRAINT [DF_T_C] DEFAULT ((0)) FOR [C]"),
        ]
    }

    #[test]
    fn test_default_injection() {
        let batch = not_null_column_with_default();

        assert_eq!(
            ObjectDdlSynthesizer::generate(&batch[0], &batch),
            "ALTER TABLE [dbo].[T] ADD [C] INT DEFAULT (0) NOT NULL;"
        );
        let constraint = ObjectDdlSynthesizer::generate(&batch[1], &batch);
        assert!(constraint.starts_with("-- Skipped: default constraint [DF_T_C]"));
        assert!(!constraint.contains("ADD CONSTRAINT"));
    }

    #[test]
    fn test_default_found_by_column_reference() {
        let batch = vec![
            ChangeRecord::new(ObjectType::Column, ChangeType::Added, "dbo", "CreatedAt")
                .with_table("Orders")
                .with_column("CreatedAt")
                .with_new_definition("[CreatedAt] DATETIME2 NOT NULL"),
            ChangeRecord::new(ObjectType::Constraint, ChangeType::Added, "dbo", "DF_Orders_Created")
                .with_table("Orders")
                .with_new_definition(
                    "ALTER TABLE [dbo].[Orders] ADD CONSTRAINT [DF_Orders_Created] DEFAULT (sysutcdatetime()) FOR [CreatedAt]",
                ),
        ];

        assert_eq!(
            ObjectDdlSynthesizer::generate(&batch[0], &batch),
            "ALTER TABLE [dbo].[Orders] ADD [CreatedAt] DATETIME2 DEFAULT (sysutcdatetime()) NOT NULL;"
        );
    }

    #[test]
    fn test_nullable_column_keeps_separate_default() {
        let batch = vec![
            ChangeRecord::new(ObjectType::Column, ChangeType::Added, "dbo", "C")
                .with_table("T")
                .with_column("C")
                .with_new_definition("[C] INT NULL"),
            ChangeRecord::new(ObjectType::Constraint, ChangeType::Added, "dbo", "DF_T_C")
                .with_table("T")
                .with_new_definition("ALTER TABLE [dbo].[T] ADD CONSTRAINT [DF_T_C] DEFAULT ((0)) FOR [C]"),
        ];

        assert_eq!(
            ObjectDdlSynthesizer::generate(&batch[0], &batch),
            "ALTER TABLE [dbo].[T] ADD [C] INT NULL;"
        );
        let constraint = ObjectDdlSynthesizer::generate(&batch[1], &batch);
        assert!(constraint.contains("FROM sys.default_constraints dc"));
        assert!(constraint.contains("OBJECT_ID(N'[dbo].[T]') AND c.name = N'C'"));
        assert!(constraint.ends_with("ALTER TABLE [dbo].[T] ADD CONSTRAINT [DF_T_C] DEFAULT ((0)) FOR [C]"));
    }

    #[test]
    fn test_default_with_for_inside_string_is_inlined_whole() {
        let batch = vec![
            ChangeRecord::new(ObjectType::Column, ChangeType::Added, "dbo", "Status")
                .with_table("Orders")
                .with_column("Status")
                .with_new_definition("[Status] NVARCHAR(50) NOT NULL"),
            ChangeRecord::new(ObjectType::Constraint, ChangeType::Added, "dbo", "DF_Orders_Status")
                .with_table("Orders")
                .with_new_definition(
                    "ALTER TABLE [dbo].[Orders] ADD CONSTRAINT [DF_Orders_Status] DEFAULT ('Waiting for approval') FOR [Status]",
                ),
        ];

        assert_eq!(
            ObjectDdlSynthesizer::generate(&batch[0], &batch),
            "ALTER TABLE [dbo].[Orders] ADD [Status] NVARCHAR(50) DEFAULT ('Waiting for approval') NOT NULL;"
        );
    }

    #[test]
    fn test_replaced_default_targets_real_column() {
        let batch = vec![
            ChangeRecord::new(ObjectType::Constraint, ChangeType::Added, "dbo", "DF_Orders_Status")
                .with_table("Orders")
                .with_new_definition(
                    "ALTER TABLE [dbo].[Orders] ADD CONSTRAINT [DF_Orders_Status] DEFAULT ('Waiting for approval') FOR [Status]",
                ),
        ];

        let sql = ObjectDdlSynthesizer::generate(&batch[0], &batch);
        assert!(sql.contains("OBJECT_ID(N'[dbo].[Orders]') AND c.name = N'Status';"));
        assert!(!sql.contains("N'approval'"));
        assert!(sql.ends_with("DEFAULT ('Waiting for approval') FOR [Status]"));
    }

    #[test]
    fn test_default_for_other_column_is_not_inlined() {
        let batch = vec![
            ChangeRecord::new(ObjectType::Column, ChangeType::Added, "dbo", "T")
                .with_table("T")
                .with_column("T")
                .with_new_definition("[T] INT NOT NULL"),
            ChangeRecord::new(ObjectType::Constraint, ChangeType::Added, "dbo", "DF_T_Other")
                .with_table("T")
                .with_new_definition("ALTER TABLE [dbo].[T] ADD CONSTRAINT [DF_T_Other] DEFAULT ((5)) FOR [Other]"),
        ];

        assert_eq!(
            ObjectDdlSynthesizer::generate(&batch[0], &batch),
            "ALTER TABLE [dbo].[T] ADD [T] INT NOT NULL;"
        );
        assert!(ObjectDdlSynthesizer::generate(&batch[1], &batch).contains("c.name = N'Other'"));
    }

    #[test]
    fn test_table_changes() {
        let added = ChangeRecord::new(ObjectType::Table, ChangeType::Added, "dbo", "Users")
            .with_new_definition("CREATE TABLE [dbo].[Users] ([Id] INT NOT NULL)\n");
        let deleted = ChangeRecord::new(ObjectType::Table, ChangeType::Deleted, "dbo", "Users")
            .with_old_definition("CREATE TABLE [dbo].[Users] ([Id] INT NOT NULL)");
        let modified = ChangeRecord::new(ObjectType::Table, ChangeType::Modified, "dbo", "Users");

        assert_eq!(generate(&added), "CREATE TABLE [dbo].[Users] ([Id] INT NOT NULL)");
        assert_eq!(generate(&deleted), "DROP TABLE [dbo].[Users];");
        assert!(generate(&modified).starts_with("-- Table [dbo].[Users] modified"));
    }

    #[test]
    fn test_column_drop_and_alter() {
        let deleted = ChangeRecord::new(ObjectType::Column, ChangeType::Deleted, "dbo", "Legacy")
            .with_table("Users")
            .with_column("Legacy")
            .with_old_definition("[Legacy] BIT NULL");
        let modified = ChangeRecord::new(ObjectType::Column, ChangeType::Modified, "dbo", "Id")
            .with_table("Users")
            .with_column("Id")
            .with_old_definition("[Id] INT IDENTITY(1,1) NOT NULL")
            .with_new_definition("[Id] BIGINT IDENTITY(1,1) NOT NULL");

        assert_eq!(generate(&deleted), "ALTER TABLE [dbo].[Users] DROP COLUMN [Legacy];");
        assert_eq!(generate(&modified), "ALTER TABLE [dbo].[Users] ALTER COLUMN [Id] BIGINT NOT NULL;");
    }

    #[test]
    fn test_column_without_table_degrades_to_comment() {
        let orphan = ChangeRecord::new(ObjectType::Column, ChangeType::Deleted, "dbo", "X");
        assert!(generate(&orphan).starts_with("-- Column dbo.X skipped"));
    }

    #[test]
    fn test_index_changes() {
        let create = "CREATE NONCLUSTERED INDEX [IX_Users_Email] ON [dbo].[Users] ([Email])";
        let deleted = ChangeRecord::new(ObjectType::Index, ChangeType::Deleted, "dbo", "IX_Users_Email")
            .with_table("Users")
            .with_old_definition(create);
        let modified = ChangeRecord::new(ObjectType::Index, ChangeType::Modified, "dbo", "IX_Users_Email")
            .with_table("Users")
            .with_old_definition(create)
            .with_new_definition("CREATE UNIQUE NONCLUSTERED INDEX [IX_Users_Email] ON [dbo].[Users] ([Email])");

        assert_eq!(generate(&deleted), "DROP INDEX IF EXISTS [IX_Users_Email] ON [dbo].[Users];");
        assert_eq!(
            generate(&modified),
            "DROP INDEX IF EXISTS [IX_Users_Email] ON [dbo].[Users];\n\
             CREATE UNIQUE NONCLUSTERED INDEX [IX_Users_Email] ON [dbo].[Users] ([Email])"
        );
    }

    #[test]
    fn test_constraint_drop_resolves_name_from_definition() {
        let deleted = ChangeRecord::new(ObjectType::Constraint, ChangeType::Deleted, "dbo", "PK_Users_file")
            .with_table("Users")
            .with_old_definition("ALTER TABLE [dbo].[Users] ADD CONSTRAINT [PK_Users] PRIMARY KEY CLUSTERED ([Id])");
        let fallback = ChangeRecord::new(ObjectType::Constraint, ChangeType::Deleted, "dbo", "UQ_Users_Email")
            .with_table("Users");

        assert_eq!(generate(&deleted), "ALTER TABLE [dbo].[Users] DROP CONSTRAINT [PK_Users];");
        assert_eq!(generate(&fallback), "ALTER TABLE [dbo].[Users] DROP CONSTRAINT [UQ_Users_Email];");
    }

    #[test]
    fn test_constraint_modified_drops_then_adds() {
        let modified = ChangeRecord::new(ObjectType::Constraint, ChangeType::Modified, "dbo", "CK_Orders_Total")
            .with_table("Orders")
            .with_old_definition("ALTER TABLE [dbo].[Orders] ADD CONSTRAINT [CK_Orders_Total] CHECK ([Total] >= 0)")
            .with_new_definition("ALTER TABLE [dbo].[Orders] ADD CONSTRAINT [CK_Orders_Total] CHECK ([Total] > 0)");

        assert_eq!(
            generate(&modified),
            "ALTER TABLE [dbo].[Orders] DROP CONSTRAINT [CK_Orders_Total];\n\
             ALTER TABLE [dbo].[Orders] ADD CONSTRAINT [CK_Orders_Total] CHECK ([Total] > 0)"
        );
    }

    #[test]
    fn test_programmable_objects() {
        let view = ChangeRecord::new(ObjectType::View, ChangeType::Modified, "dbo", "vActive")
            .with_old_definition("CREATE VIEW [dbo].[vActive] AS SELECT 1 AS A")
            .with_new_definition("CREATE VIEW [dbo].[vActive] AS SELECT 2 AS A");
        let proc = ChangeRecord::new(ObjectType::StoredProcedure, ChangeType::Deleted, "app", "usp_Purge")
            .with_old_definition("CREATE PROCEDURE [app].[usp_Purge] AS RETURN 0");
        let func = ChangeRecord::new(ObjectType::Function, ChangeType::Deleted, "dbo", "fn_Tax");
        let trigger = ChangeRecord::new(ObjectType::Trigger, ChangeType::Deleted, "dbo", "trg_Audit");

        assert_eq!(
            generate(&view),
            "DROP VIEW [dbo].[vActive];\nGO\nCREATE VIEW [dbo].[vActive] AS SELECT 2 AS A"
        );
        assert_eq!(generate(&proc), "DROP PROCEDURE [app].[usp_Purge];");
        assert_eq!(generate(&func), "DROP FUNCTION [dbo].[fn_Tax];");
        assert_eq!(generate(&trigger), "DROP TRIGGER [dbo].[trg_Audit];");
    }

    #[test]
    fn test_extended_property_drop() {
        let deleted = ChangeRecord::new(ObjectType::ExtendedProperty, ChangeType::Deleted, "dbo", "MS_Description")
            .with_old_definition(
                "EXEC sp_addextendedproperty @name = N'MS_Description', @value = N'Users', \
                 @level0type = N'SCHEMA', @level0name = N'dbo', @level1type = N'TABLE', @level1name = N'Users'",
            );
        let unparseable = ChangeRecord::new(ObjectType::ExtendedProperty, ChangeType::Deleted, "dbo", "Broken")
            .with_old_definition("EXEC sp_addextendedproperty N'x', N'y'");

        assert_eq!(
            generate(&deleted),
            "EXEC sp_dropextendedproperty @name = N'MS_Description', @level0type = N'SCHEMA', \
             @level0name = N'dbo', @level1type = N'TABLE', @level1name = N'Users';"
        );
        assert!(generate(&unparseable).starts_with("-- Could not parse extended property"));
    }

    #[test]
    fn test_renames() {
        let column = ChangeRecord::new(ObjectType::Column, ChangeType::Modified, "dbo", "Bar")
            .with_table("T")
            .with_column("Bar")
            .with_rename(RenameInfo::new("Foo", RenameKind::Column));
        let index = ChangeRecord::new(ObjectType::Index, ChangeType::Modified, "dbo", "IX_New")
            .with_table("T")
            .with_rename(RenameInfo::new("IX_Old", RenameKind::Index));
        let trigger = ChangeRecord::new(ObjectType::Trigger, ChangeType::Modified, "dbo", "trg_New")
            .with_rename(RenameInfo::new("trg_Old", RenameKind::Trigger));

        assert_eq!(generate(&column), "EXEC sp_rename '[dbo].[T].[Foo]', 'Bar', 'COLUMN';");
        assert_eq!(generate(&index), "EXEC sp_rename '[dbo].[T].[IX_Old]', 'IX_New', 'INDEX';");
        assert_eq!(generate(&trigger), "EXEC sp_rename '[dbo].[trg_Old]', 'trg_New', 'OBJECT';");
    }
}
