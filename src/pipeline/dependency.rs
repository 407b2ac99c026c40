//! Dependency resolver
//!
//! Orders an unordered change list so SQL Server never sees a statement that
//! references an object not yet created or already dropped: everything that
//! depends on a table is dropped before it and created after it.

use crate::change::{ChangeRecord, ChangeType, ObjectType};
use tracing::debug;

/// Execution buckets, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Bucket {
    DropForeignKeys,
    DropConstraints,
    DropIndexes,
    DropColumns,
    DropObjects,
    DropTables,
    CreateTables,
    AddColumns,
    Modifications,
    CreateIndexes,
    CreateConstraints,
    CreateForeignKeys,
    CreateObjects,
}

pub struct DependencyResolver;

impl DependencyResolver {
    /// Stable-sort records into execution buckets. Order within a bucket is
    /// the input order.
    pub fn order(records: &[ChangeRecord]) -> Vec<ChangeRecord> {
        let mut keyed: Vec<(Bucket, &ChangeRecord)> =
            records.iter().map(|r| (Self::bucket(r), r)).collect();
        keyed.sort_by_key(|(bucket, _)| *bucket);

        debug!(
            "Ordered {} changes: {} drops, {} modifications, {} creates",
            records.len(),
            keyed.iter().filter(|(b, _)| *b <= Bucket::DropTables).count(),
            keyed.iter().filter(|(b, _)| *b == Bucket::Modifications).count(),
            keyed
                .iter()
                .filter(|(b, _)| *b > Bucket::DropTables && *b != Bucket::Modifications)
                .count(),
        );

        keyed.into_iter().map(|(_, r)| r.clone()).collect()
    }

    /// Which bucket a record executes in
    pub fn bucket(record: &ChangeRecord) -> Bucket {
        match record.change_type {
            ChangeType::Modified => Bucket::Modifications,
            ChangeType::Deleted => match record.object_type {
                ObjectType::Constraint if record.is_foreign_key() => Bucket::DropForeignKeys,
                ObjectType::Constraint => Bucket::DropConstraints,
                ObjectType::Index => Bucket::DropIndexes,
                ObjectType::Column => Bucket::DropColumns,
                ObjectType::Table => Bucket::DropTables,
                ObjectType::View
                | ObjectType::StoredProcedure
                | ObjectType::Function
                | ObjectType::Trigger
                | ObjectType::ExtendedProperty => Bucket::DropObjects,
            },
            ChangeType::Added => match record.object_type {
                ObjectType::Table => Bucket::CreateTables,
                ObjectType::Column => Bucket::AddColumns,
                ObjectType::Index => Bucket::CreateIndexes,
                ObjectType::Constraint if record.is_foreign_key() => Bucket::CreateForeignKeys,
                ObjectType::Constraint => Bucket::CreateConstraints,
                ObjectType::View
                | ObjectType::StoredProcedure
                | ObjectType::Function
                | ObjectType::Trigger
                | ObjectType::ExtendedProperty => Bucket::CreateObjects,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(ordered: &[ChangeRecord], name: &str) -> usize {
        ordered
            .iter()
            .position(|r| r.object_name == name)
            .unwrap_or_else(|| panic!("{} missing from ordered output", name))
    }

    #[test]
    fn test_constraint_drop_precedes_table_drop() {
        let records = vec![
            ChangeRecord::new(ObjectType::Table, ChangeType::Deleted, "dbo", "Orders"),
            ChangeRecord::new(ObjectType::Constraint, ChangeType::Deleted, "dbo", "CK_Orders_Total")
                .with_table("Orders"),
            ChangeRecord::new(ObjectType::Constraint, ChangeType::Deleted, "dbo", "FK_Orders_Users")
                .with_table("Orders"),
        ];
        let ordered = DependencyResolver::order(&records);

        assert!(position(&ordered, "FK_Orders_Users") < position(&ordered, "CK_Orders_Total"));
        assert!(position(&ordered, "CK_Orders_Total") < position(&ordered, "Orders"));
    }

    #[test]
    fn test_foreign_key_created_last_among_constraints() {
        let records = vec![
            ChangeRecord::new(ObjectType::Constraint, ChangeType::Added, "dbo", "FK_Orders_Users")
                .with_table("Orders"),
            ChangeRecord::new(ObjectType::Constraint, ChangeType::Added, "dbo", "PK_Orders")
                .with_table("Orders"),
            ChangeRecord::new(ObjectType::Table, ChangeType::Added, "dbo", "Orders"),
            ChangeRecord::new(ObjectType::View, ChangeType::Added, "dbo", "vOrders"),
        ];
        let ordered = DependencyResolver::order(&records);
        let names: Vec<&str> = ordered.iter().map(|r| r.object_name.as_str()).collect();

        assert_eq!(names, vec!["Orders", "PK_Orders", "FK_Orders_Users", "vOrders"]);
    }

    #[test]
    fn test_full_bucket_order() {
        let records = vec![
            ChangeRecord::new(ObjectType::View, ChangeType::Added, "dbo", "create_view"),
            ChangeRecord::new(ObjectType::Constraint, ChangeType::Added, "dbo", "FK_create")
                .with_table("T"),
            ChangeRecord::new(ObjectType::Constraint, ChangeType::Added, "dbo", "CK_create")
                .with_table("T"),
            ChangeRecord::new(ObjectType::Index, ChangeType::Added, "dbo", "IX_create").with_table("T"),
            ChangeRecord::new(ObjectType::Table, ChangeType::Modified, "dbo", "modified"),
            ChangeRecord::new(ObjectType::Column, ChangeType::Added, "dbo", "add_column").with_table("T"),
            ChangeRecord::new(ObjectType::Table, ChangeType::Added, "dbo", "create_table"),
            ChangeRecord::new(ObjectType::Table, ChangeType::Deleted, "dbo", "drop_table"),
            ChangeRecord::new(ObjectType::Trigger, ChangeType::Deleted, "dbo", "drop_trigger"),
            ChangeRecord::new(ObjectType::Column, ChangeType::Deleted, "dbo", "drop_column").with_table("T"),
            ChangeRecord::new(ObjectType::Index, ChangeType::Deleted, "dbo", "IX_drop").with_table("T"),
            ChangeRecord::new(ObjectType::Constraint, ChangeType::Deleted, "dbo", "CK_drop").with_table("T"),
            ChangeRecord::new(ObjectType::Constraint, ChangeType::Deleted, "dbo", "FK_drop").with_table("T"),
        ];
        let ordered = DependencyResolver::order(&records);
        let names: Vec<&str> = ordered.iter().map(|r| r.object_name.as_str()).collect();

        assert_eq!(
            names,
            vec![
                "FK_drop",
                "CK_drop",
                "IX_drop",
                "drop_column",
                "drop_trigger",
                "drop_table",
                "create_table",
                "add_column",
                "modified",
                "IX_create",
                "CK_create",
                "FK_create",
                "create_view",
            ]
        );
    }

    #[test]
    fn test_modifications_keep_input_order() {
        let records = vec![
            ChangeRecord::new(ObjectType::View, ChangeType::Modified, "dbo", "b"),
            ChangeRecord::new(ObjectType::Column, ChangeType::Modified, "dbo", "a").with_table("T"),
            ChangeRecord::new(ObjectType::Index, ChangeType::Modified, "dbo", "c").with_table("T"),
        ];
        let ordered = DependencyResolver::order(&records);
        let names: Vec<&str> = ordered.iter().map(|r| r.object_name.as_str()).collect();

        assert_eq!(names, vec!["b", "a", "c"]);
    }
}
