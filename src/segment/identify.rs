//! Statement ownership
//!
//! Decides which database object a single GO-batch belongs to. Rules are
//! tried most specific first; the first hit wins.

use crate::synthesis::ExtendedPropertyCall;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

const DEFAULT_SCHEMA: &str = "dbo";

/// `[name]` or `name`
const IDENT: &str = r"(\[[^\]]+\]|\w+)";

static SCHEMA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?is)\bCREATE\s+SCHEMA\s+{IDENT}")).expect("valid CREATE SCHEMA regex")
});

/// Shadow tables SQL Server uses when it rebuilds a table
static TEMP_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\[?(\w+)\]?\s*\.\s*)?\[?tmp_ms_xx_(\w+)\]?").expect("valid temp table regex")
});

static ALTER_CONSTRAINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)\bALTER\s+TABLE\s+{IDENT}(?:\s*\.\s*{IDENT})?\s+(?:WITH\s+(?:NO)?CHECK\s+)?(?:ADD|DROP|(?:NO)?CHECK)\s+CONSTRAINT\s+(?:IF\s+EXISTS\s+)?{IDENT}"
    ))
    .expect("valid ALTER TABLE constraint regex")
});

static INDEX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)\b(?:CREATE|DROP|ALTER)\s+(?:UNIQUE\s+)?(?:(?:NON)?CLUSTERED\s+)?(?:COLUMNSTORE\s+)?INDEX\s+(?:IF\s+EXISTS\s+)?{IDENT}\s+ON\s+{IDENT}(?:\s*\.\s*{IDENT})?"
    ))
    .expect("valid index regex")
});

static OBJECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)\b(?:CREATE|ALTER|DROP)\s+(?:OR\s+ALTER\s+)?(TABLE|VIEW|PROCEDURE|PROC|FUNCTION|TRIGGER)\s+(?:IF\s+EXISTS\s+)?{IDENT}(?:\s*\.\s*{IDENT})?"
    ))
    .expect("valid object regex")
});

static RENAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\bsp_rename\s+N?'([^']+)'").expect("valid sp_rename regex")
});

static FOREIGN_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bFOREIGN\s+KEY\b").expect("valid FOREIGN KEY regex"));

static PRIMARY_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bPRIMARY\s+KEY\b").expect("valid PRIMARY KEY regex"));

/// Kind of object a segment is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SegmentKind {
    Schema,
    Table,
    View,
    Procedure,
    Function,
    Trigger,
    /// Schema-scoped object known only by name (renamed constraint, property owner)
    Object,
    /// Statements not tied to one object (transaction control, guards, history)
    Script,
}

impl SegmentKind {
    fn from_keyword(keyword: &str) -> Self {
        match keyword.to_ascii_uppercase().as_str() {
            "TABLE" => SegmentKind::Table,
            "VIEW" => SegmentKind::View,
            "PROCEDURE" | "PROC" => SegmentKind::Procedure,
            "FUNCTION" => SegmentKind::Function,
            "TRIGGER" => SegmentKind::Trigger,
            _ => SegmentKind::Object,
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SegmentKind::Schema => "Schema",
            SegmentKind::Table => "Table",
            SegmentKind::View => "View",
            SegmentKind::Procedure => "Procedure",
            SegmentKind::Function => "Function",
            SegmentKind::Trigger => "Trigger",
            SegmentKind::Object => "Object",
            SegmentKind::Script => "Script",
        };
        f.write_str(label)
    }
}

/// Object a statement belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementOwner {
    pub kind: SegmentKind,
    pub schema: String,
    pub name: String,
}

impl StatementOwner {
    fn new(kind: SegmentKind, schema: Option<&str>, name: &str) -> Self {
        Self {
            kind,
            schema: schema.map(unbracket).unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
            name: unbracket(name),
        }
    }

    /// Grouping key; SQL Server identifiers compare case-insensitively
    pub fn key(&self) -> (String, String) {
        (self.schema.to_lowercase(), self.name.to_lowercase())
    }
}

/// Identify the owning object of one statement, ignoring comment lines
pub fn identify(statement: &str) -> Option<StatementOwner> {
    let code = strip_comments(statement);
    if code.trim().is_empty() {
        return None;
    }

    schema_creation(&code)
        .or_else(|| temp_table(&code))
        .or_else(|| foreign_key(&code))
        .or_else(|| index(&code))
        .or_else(|| primary_key(&code))
        .or_else(|| object(&code))
        .or_else(|| rename(&code))
        .or_else(|| extended_property(&code))
}

fn schema_creation(code: &str) -> Option<StatementOwner> {
    let caps = SCHEMA_RE.captures(code)?;
    let name = caps.get(1)?.as_str();
    Some(StatementOwner::new(SegmentKind::Schema, Some(name), name))
}

fn temp_table(code: &str) -> Option<StatementOwner> {
    TEMP_TABLE_RE
        .captures_iter(code)
        .find(|caps| {
            caps.get(2)
                .is_some_and(|m| !m.as_str().to_ascii_lowercase().starts_with("constraint_"))
        })
        .and_then(|caps| {
            let table = caps.get(2)?.as_str();
            Some(StatementOwner::new(
                SegmentKind::Table,
                caps.get(1).map(|m| m.as_str()),
                table,
            ))
        })
}

/// (schema, table, constraint) of an `ALTER TABLE ... CONSTRAINT` statement
fn altered_constraint(code: &str) -> Option<(Option<&str>, &str, String)> {
    let caps = ALTER_CONSTRAINT_RE.captures(code)?;
    let (schema, table) = split_qualified(caps.get(1)?.as_str(), caps.get(2).map(|m| m.as_str()));
    Some((schema, table, unbracket(caps.get(3)?.as_str())))
}

fn foreign_key(code: &str) -> Option<StatementOwner> {
    let (schema, table, constraint) = altered_constraint(code)?;
    let is_fk = FOREIGN_KEY_RE.is_match(code) || has_prefix(&constraint, "FK_");
    is_fk.then(|| StatementOwner::new(SegmentKind::Table, schema, table))
}

fn index(code: &str) -> Option<StatementOwner> {
    let caps = INDEX_RE.captures(code)?;
    let (schema, table) = split_qualified(caps.get(2)?.as_str(), caps.get(3).map(|m| m.as_str()));
    Some(StatementOwner::new(SegmentKind::Table, schema, table))
}

fn primary_key(code: &str) -> Option<StatementOwner> {
    let (schema, table, constraint) = altered_constraint(code)?;
    let is_pk = PRIMARY_KEY_RE.is_match(code) || has_prefix(&constraint, "PK_");
    is_pk.then(|| StatementOwner::new(SegmentKind::Table, schema, table))
}

fn object(code: &str) -> Option<StatementOwner> {
    let caps = OBJECT_RE.captures(code)?;
    let kind = SegmentKind::from_keyword(caps.get(1)?.as_str());
    let (schema, name) = split_qualified(caps.get(2)?.as_str(), caps.get(3).map(|m| m.as_str()));
    Some(StatementOwner::new(kind, schema, name))
}

/// `sp_rename '[s].[t].[child]'` belongs to the table; `'[s].[obj]'` to the object
fn rename(code: &str) -> Option<StatementOwner> {
    let caps = RENAME_RE.captures(code)?;
    let parts: Vec<String> = split_dotted(caps.get(1)?.as_str());
    match parts.as_slice() {
        [schema, table, _child] => Some(StatementOwner::new(SegmentKind::Table, Some(schema.as_str()), table)),
        [schema, name] => Some(StatementOwner::new(SegmentKind::Object, Some(schema.as_str()), name)),
        [name] => Some(StatementOwner::new(SegmentKind::Object, None, name)),
        _ => None,
    }
}

fn extended_property(code: &str) -> Option<StatementOwner> {
    if !code.to_ascii_lowercase().contains("extendedproperty") {
        return None;
    }
    let call = ExtendedPropertyCall::parse(code)?;
    let schema = call.schema_name();
    match call.owner() {
        Some((kind, name)) => Some(StatementOwner::new(
            SegmentKind::from_keyword(&kind),
            schema.as_deref(),
            &name,
        )),
        None => {
            let schema = schema?;
            Some(StatementOwner::new(SegmentKind::Schema, Some(schema.as_str()), &schema))
        }
    }
}

/// Drop `--` comment lines; block comments are left alone
pub fn strip_comments(statement: &str) -> String {
    statement
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `(first, Some(second))` is `schema.name`; `(first, None)` is a bare name
fn split_qualified<'a>(first: &'a str, second: Option<&'a str>) -> (Option<&'a str>, &'a str) {
    match second {
        Some(name) => (Some(first), name),
        None => (None, first),
    }
}

/// `[dbo].[T].[Col]` -> `["dbo", "T", "Col"]`
fn split_dotted(path: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_brackets = false;
    for c in path.chars() {
        match c {
            '[' => in_brackets = true,
            ']' => in_brackets = false,
            '.' if !in_brackets => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts.into_iter().map(|p| p.trim().to_string()).collect()
}

fn unbracket(name: &str) -> String {
    let trimmed = name.trim();
    trimmed
        .strip_prefix('[')
        .and_then(|n| n.strip_suffix(']'))
        .unwrap_or(trimmed)
        .replace("]]", "]")
}

fn has_prefix(name: &str, prefix: &str) -> bool {
    name.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn owner(statement: &str) -> (SegmentKind, String, String) {
        let owner = identify(statement).unwrap();
        (owner.kind, owner.schema, owner.name)
    }

    fn table(schema: &str, name: &str) -> (SegmentKind, String, String) {
        (SegmentKind::Table, schema.to_string(), name.to_string())
    }

    #[test]
    fn test_schema_creation() {
        assert_eq!(
            owner("CREATE SCHEMA [sales] AUTHORIZATION [dbo];"),
            (SegmentKind::Schema, "sales".to_string(), "sales".to_string())
        );
    }

    #[test]
    fn test_temp_table_maps_to_real_table() {
        assert_eq!(
            owner("INSERT INTO [dbo].[tmp_ms_xx_Orders] ([Id]) SELECT [Id] FROM [dbo].[Orders];"),
            table("dbo", "Orders")
        );
        assert_eq!(
            owner("EXECUTE sp_rename N'[dbo].[tmp_ms_xx_Orders]', N'Orders';"),
            table("dbo", "Orders")
        );
    }

    #[test]
    fn test_foreign_key_belongs_to_altered_table() {
        assert_eq!(
            owner(
                "ALTER TABLE [dbo].[Orders] WITH NOCHECK ADD CONSTRAINT [FK_Orders_Users] \
                 FOREIGN KEY ([UserId]) REFERENCES [dbo].[Users] ([Id]);"
            ),
            table("dbo", "Orders")
        );
        assert_eq!(
            owner("ALTER TABLE [sales].[Orders] DROP CONSTRAINT [FK_Orders_Users];"),
            table("sales", "Orders")
        );
    }

    #[test]
    fn test_index_belongs_to_table() {
        assert_eq!(
            owner("CREATE UNIQUE NONCLUSTERED INDEX [IX_Users_Email] ON [dbo].[Users] ([Email]);"),
            table("dbo", "Users")
        );
        assert_eq!(
            owner("DROP INDEX IF EXISTS [IX_Old] ON [dbo].[Orders];"),
            table("dbo", "Orders")
        );
    }

    #[test]
    fn test_generic_objects() {
        assert_eq!(
            owner("-- 3. Add view dbo.vActive\nCREATE VIEW [dbo].[vActive] AS SELECT 1 AS One"),
            (SegmentKind::View, "dbo".to_string(), "vActive".to_string())
        );
        assert_eq!(
            owner("CREATE OR ALTER PROCEDURE usp_Get AS SELECT 1"),
            (SegmentKind::Procedure, "dbo".to_string(), "usp_Get".to_string())
        );
        assert_eq!(
            owner("ALTER TABLE [dbo].[Users] ADD [Age] INT NULL;"),
            table("dbo", "Users")
        );
    }

    #[test]
    fn test_rename_and_extended_property() {
        assert_eq!(
            owner("EXEC sp_rename '[dbo].[Users].[Mail]', 'Email', 'COLUMN';"),
            table("dbo", "Users")
        );
        assert_eq!(
            owner("EXEC sp_rename '[dbo].[PK_Old]', 'PK_New', 'OBJECT';"),
            (SegmentKind::Object, "dbo".to_string(), "PK_Old".to_string())
        );
        assert_eq!(
            owner(
                "EXEC sp_addextendedproperty @name = N'MS_Description', @value = N'x', \
                 @level0type = N'SCHEMA', @level0name = N'dbo', @level1type = N'TABLE', @level1name = N'Users';"
            ),
            table("dbo", "Users")
        );
    }

    #[test]
    fn test_unidentified_statements() {
        assert!(identify("SET XACT_ABORT ON;\nBEGIN TRANSACTION;").is_none());
        assert!(identify("-- Skipped: default constraint [DF_T_C] is applied inline").is_none());
        assert!(identify("COMMIT TRANSACTION;").is_none());
    }
}
