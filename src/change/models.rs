//! Change record data model
//!
//! A `ChangeRecord` is one atomic detected difference between two revisions
//! of the schema. Every other component consumes these.

use serde::{Deserialize, Serialize};

/// Categories of schema objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectType {
    Table,
    Column,
    Index,
    Constraint,
    View,
    StoredProcedure,
    Function,
    Trigger,
    ExtendedProperty,
}

impl ObjectType {
    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            ObjectType::Table => "table",
            ObjectType::Column => "column",
            ObjectType::Index => "index",
            ObjectType::Constraint => "constraint",
            ObjectType::View => "view",
            ObjectType::StoredProcedure => "procedure",
            ObjectType::Function => "function",
            ObjectType::Trigger => "trigger",
            ObjectType::ExtendedProperty => "property",
        }
    }

    /// Token used in migration ids, e.g. `3columns`
    pub fn count_token(&self, count: usize) -> String {
        let word = match (self, count) {
            (_, 1) => self.label().to_string(),
            (ObjectType::Index, _) => "indexes".to_string(),
            (ObjectType::ExtendedProperty, _) => "properties".to_string(),
            _ => format!("{}s", self.label()),
        };
        format!("{}{}", count, word)
    }

    /// Keyword used in `DROP <KIND>` for programmable objects
    pub fn drop_keyword(&self) -> Option<&'static str> {
        match self {
            ObjectType::View => Some("VIEW"),
            ObjectType::StoredProcedure => Some("PROCEDURE"),
            ObjectType::Function => Some("FUNCTION"),
            ObjectType::Trigger => Some("TRIGGER"),
            _ => None,
        }
    }
}

/// Type of schema change detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    /// Object exists only in the new revision
    Added,
    /// Object exists only in the old revision
    Deleted,
    /// Object exists in both with a different definition
    Modified,
}

impl ChangeType {
    /// The change that undoes this one
    pub fn inverse(&self) -> Self {
        match self {
            ChangeType::Added => ChangeType::Deleted,
            ChangeType::Deleted => ChangeType::Added,
            ChangeType::Modified => ChangeType::Modified,
        }
    }
}

/// What a rename applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenameKind {
    Column,
    Index,
    Constraint,
    Trigger,
}

impl RenameKind {
    /// Object type argument passed to `sp_rename`
    pub fn sp_rename_type(&self) -> &'static str {
        match self {
            RenameKind::Column => "COLUMN",
            RenameKind::Index => "INDEX",
            RenameKind::Constraint | RenameKind::Trigger => "OBJECT",
        }
    }

    /// Columns and indexes are addressed through their table; constraints
    /// and triggers are schema-scoped objects.
    pub fn is_table_scoped(&self) -> bool {
        matches!(self, RenameKind::Column | RenameKind::Index)
    }
}

/// Rename metadata carried alongside a change record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameInfo {
    pub is_rename: bool,
    #[serde(default)]
    pub old_name: String,
    pub rename_kind: RenameKind,
}

impl RenameInfo {
    pub fn new(old_name: impl Into<String>, rename_kind: RenameKind) -> Self {
        Self {
            is_rename: true,
            old_name: old_name.into(),
            rename_kind,
        }
    }
}

/// One atomic detected difference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub object_type: ObjectType,
    pub change_type: ChangeType,
    pub schema: String,
    pub object_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename_info: Option<RenameInfo>,
}

impl ChangeRecord {
    /// Create a bare record; definitions and scoping are added with the `with_*` builders
    pub fn new(
        object_type: ObjectType,
        change_type: ChangeType,
        schema: impl Into<String>,
        object_name: impl Into<String>,
    ) -> Self {
        Self {
            object_type,
            change_type,
            schema: schema.into(),
            object_name: object_name.into(),
            table_name: None,
            column_name: None,
            old_definition: None,
            new_definition: None,
            rename_info: None,
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table_name = Some(table.into());
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column_name = Some(column.into());
        self
    }

    pub fn with_old_definition(mut self, definition: impl Into<String>) -> Self {
        self.old_definition = Some(definition.into());
        self
    }

    pub fn with_new_definition(mut self, definition: impl Into<String>) -> Self {
        self.new_definition = Some(definition.into());
        self
    }

    pub fn with_rename(mut self, rename: RenameInfo) -> Self {
        self.rename_info = Some(rename);
        self
    }

    /// Rename metadata, if this record is a rename
    pub fn rename(&self) -> Option<&RenameInfo> {
        self.rename_info.as_ref().filter(|r| r.is_rename)
    }

    pub fn is_rename(&self) -> bool {
        self.rename().is_some()
    }

    /// Owning table for columns, indexes and constraints (empty names count as missing)
    pub fn table(&self) -> Option<&str> {
        self.table_name.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// Column name, falling back to the object name for column records
    pub fn column(&self) -> Option<&str> {
        match self.column_name.as_deref().filter(|c| !c.trim().is_empty()) {
            Some(column) => Some(column),
            None if self.object_type == ObjectType::Column => Some(self.object_name.as_str()),
            None => None,
        }
    }

    /// Name the object carries after this change is applied
    pub fn current_name(&self) -> &str {
        match self.rename() {
            Some(r) if r.rename_kind == RenameKind::Column => {
                self.column().unwrap_or(&self.object_name)
            }
            _ => &self.object_name,
        }
    }

    pub fn old_def(&self) -> Option<&str> {
        self.old_definition.as_deref().filter(|d| !d.trim().is_empty())
    }

    pub fn new_def(&self) -> Option<&str> {
        self.new_definition.as_deref().filter(|d| !d.trim().is_empty())
    }

    /// The most recent definition available (new, else old)
    pub fn definition(&self) -> Option<&str> {
        self.new_def().or_else(|| self.old_def())
    }

    /// The record that undoes this one: Added and Deleted swap, definitions
    /// swap, and rename names swap.
    pub fn inverted(&self) -> ChangeRecord {
        let mut inverse = self.clone();
        inverse.change_type = self.change_type.inverse();
        inverse.old_definition = self.new_definition.clone();
        inverse.new_definition = self.old_definition.clone();

        if let Some(rename) = self.rename() {
            let current = self.current_name().to_string();
            let previous = rename.old_name.clone();
            if rename.rename_kind == RenameKind::Column {
                inverse.column_name = Some(previous.clone());
                if self.column_name.is_none() {
                    inverse.object_name = previous.clone();
                }
            } else {
                inverse.object_name = previous.clone();
            }
            inverse.rename_info = Some(RenameInfo::new(current, rename.rename_kind));
        }

        inverse
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_token_pluralization() {
        assert_eq!(ObjectType::Table.count_token(1), "1table");
        assert_eq!(ObjectType::Table.count_token(2), "2tables");
        assert_eq!(ObjectType::Index.count_token(3), "3indexes");
        assert_eq!(ObjectType::ExtendedProperty.count_token(2), "2properties");
    }

    #[test]
    fn test_inverted_swaps_definitions_and_change_type() {
        let record = ChangeRecord::new(ObjectType::View, ChangeType::Added, "dbo", "vUsers")
            .with_new_definition("CREATE VIEW [dbo].[vUsers] AS SELECT 1 AS X");
        let inverse = record.inverted();

        assert_eq!(inverse.change_type, ChangeType::Deleted);
        assert_eq!(inverse.new_definition, None);
        assert_eq!(
            inverse.old_definition.as_deref(),
            Some("CREATE VIEW [dbo].[vUsers] AS SELECT 1 AS X")
        );
        assert_eq!(inverse.inverted(), record);
    }

    #[test]
    fn test_inverted_swaps_rename_names() {
        let record = ChangeRecord::new(ObjectType::Column, ChangeType::Modified, "dbo", "Bar")
            .with_table("T")
            .with_column("Bar")
            .with_rename(RenameInfo::new("Foo", RenameKind::Column));
        let inverse = record.inverted();

        assert_eq!(inverse.current_name(), "Foo");
        assert_eq!(inverse.rename().map(|r| r.old_name.as_str()), Some("Bar"));
    }

    #[test]
    fn test_rename_flag_must_be_set() {
        let mut info = RenameInfo::new("Old", RenameKind::Index);
        info.is_rename = false;
        let record = ChangeRecord::new(ObjectType::Index, ChangeType::Modified, "dbo", "IX_New")
            .with_rename(info);

        assert!(!record.is_rename());
    }

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{
            "objectType": "Column",
            "changeType": "Added",
            "schema": "dbo",
            "objectName": "Email",
            "tableName": "Users",
            "columnName": "Email",
            "newDefinition": "[Email] NVARCHAR(255) NULL"
        }"#;
        let record: ChangeRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.object_type, ObjectType::Column);
        assert_eq!(record.table(), Some("Users"));
        assert!(record.rename().is_none());
    }
}
