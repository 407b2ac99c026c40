//! `sp_rename` generation
//!
//! Shared by both directions: the reverse synthesizer hands in a record
//! whose names are already swapped.

use crate::change::{ChangeRecord, RenameInfo};
use crate::synthesis::patterns::{quote_ident, sql_literal};

/// Build the `sp_rename` call for a rename record. Missing metadata yields
/// a comment placeholder.
pub fn rename_sql(record: &ChangeRecord, rename: &RenameInfo) -> String {
    let old_name = rename.old_name.trim();
    let new_name = record.current_name().trim();
    let kind = rename.rename_kind;

    if old_name.is_empty() {
        return format!(
            "-- Rename of {} {}.{} skipped: previous name was not recorded",
            record.object_type.label(),
            record.schema,
            new_name
        );
    }

    let source = if kind.is_table_scoped() {
        let Some(table) = record.table() else {
            return format!(
                "-- Rename of {} {} to {} skipped: owning table was not recorded",
                record.object_type.label(),
                old_name,
                new_name
            );
        };
        format!(
            "{}.{}.{}",
            quote_ident(&record.schema),
            quote_ident(table),
            quote_ident(old_name)
        )
    } else {
        format!("{}.{}", quote_ident(&record.schema), quote_ident(old_name))
    };

    format!(
        "EXEC sp_rename '{}', '{}', '{}';",
        sql_literal(&source),
        sql_literal(new_name),
        kind.sp_rename_type()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ChangeType, ObjectType, RenameKind};

    #[test]
    fn test_constraint_rename_is_schema_scoped() {
        let rename = RenameInfo::new("CK_Old", RenameKind::Constraint);
        let record = ChangeRecord::new(ObjectType::Constraint, ChangeType::Modified, "sales", "CK_New")
            .with_table("Orders")
            .with_rename(rename.clone());

        assert_eq!(
            rename_sql(&record, &rename),
            "EXEC sp_rename '[sales].[CK_Old]', 'CK_New', 'OBJECT';"
        );
    }

    #[test]
    fn test_missing_old_name_is_a_comment() {
        let rename = RenameInfo::new("  ", RenameKind::Trigger);
        let record = ChangeRecord::new(ObjectType::Trigger, ChangeType::Modified, "dbo", "trg_Audit")
            .with_rename(rename.clone());

        assert!(rename_sql(&record, &rename).starts_with("-- Rename of trigger dbo.trg_Audit skipped"));
    }
}
