//! Extended property calls
//!
//! Parses the named parameters of a stored `sp_addextendedproperty` call so
//! the matching drop or update can be synthesized.

use once_cell::sync::Lazy;
use regex::Regex;

/// Parameters in the order SQL Server documents them
const PARAMETERS: [&str; 8] = [
    "name",
    "value",
    "level0type",
    "level0name",
    "level1type",
    "level1name",
    "level2type",
    "level2name",
];

static PARAMETER_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    PARAMETERS
        .iter()
        .map(|param| {
            Regex::new(&format!(
                r"(?is)@{}\s*=\s*(N?'(?:[^']|'')*'|NULL\b|[\w\.]+)",
                param
            ))
            .expect("valid extended property parameter regex")
        })
        .collect()
});

/// Parsed parameters; each value is the raw T-SQL literal (e.g. `N'dbo'`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedPropertyCall {
    values: [Option<String>; 8],
}

impl ExtendedPropertyCall {
    /// Extract every parameter independently; returns `None` when `@name`
    /// is absent since nothing can be addressed without it.
    pub fn parse(call: &str) -> Option<Self> {
        let mut values: [Option<String>; 8] = Default::default();
        for (slot, re) in values.iter_mut().zip(PARAMETER_RES.iter()) {
            *slot = re
                .captures(call)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string());
        }

        let parsed = Self { values };
        parsed.name()?;
        Some(parsed)
    }

    pub fn name(&self) -> Option<&str> {
        self.values[0].as_deref()
    }

    /// Schema (level0 name), unquoted
    pub fn schema_name(&self) -> Option<String> {
        self.values[3].as_deref().map(unquote_literal)
    }

    /// Schema-level object carrying the property (level1), with its type
    pub fn owner(&self) -> Option<(String, String)> {
        let kind = self.values[4].as_deref().map(unquote_literal)?;
        let name = self.values[5].as_deref().map(unquote_literal)?;
        Some((kind, name))
    }

    /// `@param = value` pairs, optionally without `@value`
    fn arguments(&self, with_value: bool) -> String {
        PARAMETERS
            .iter()
            .zip(self.values.iter())
            .filter(|(param, _)| with_value || **param != "value")
            .filter_map(|(param, value)| value.as_ref().map(|v| format!("@{} = {}", param, v)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn drop_sql(&self) -> String {
        format!("EXEC sp_dropextendedproperty {};", self.arguments(false))
    }

    /// Update the property, adding it instead when it does not exist yet
    /// (error 15217); any other failure is rethrown.
    pub fn update_or_add_sql(&self) -> String {
        format!(
            "BEGIN TRY\n    EXEC sp_updateextendedproperty {args};\nEND TRY\nBEGIN CATCH\n    IF ERROR_NUMBER() = 15217\n        EXEC sp_addextendedproperty {args};\n    ELSE\n        THROW;\nEND CATCH",
            args = self.arguments(true)
        )
    }
}

/// `N'O''Brien'` -> `O'Brien`
fn unquote_literal(literal: &str) -> String {
    let trimmed = literal.trim();
    let trimmed = trimmed.strip_prefix('N').unwrap_or(trimmed);
    match trimmed.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        Some(inner) => inner.replace("''", "'"),
        None => trimmed.to_string(),
    }
}
