//! Migration identity
//!
//! Migration ids, summary tokens and body checksums.

use crate::change::{count_by_type, ChangeRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// `yyyyMMdd_HHmmss` UTC timestamp plus a summary token, e.g.
/// `20240501_093000_1table_2columns`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationId(String);

impl MigrationId {
    /// Derive an id for a batch at the given time
    pub fn generate(records: &[ChangeRecord], at: DateTime<Utc>) -> Self {
        Self(format!(
            "{}_{}",
            at.format("%Y%m%d_%H%M%S"),
            summary_token(records)
        ))
    }

    /// Wrap an id supplied by the caller
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Forward script filename
    pub fn forward_filename(&self) -> String {
        format!("{}.sql", self.0)
    }

    /// Reverse script filename
    pub fn reverse_filename(&self) -> String {
        format!("{}_reverse.sql", self.0)
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-object-type counts, e.g. `2tables_1column_1constraint`
pub fn summary_token(records: &[ChangeRecord]) -> String {
    let counts = count_by_type(records);
    if counts.is_empty() {
        return "empty".to_string();
    }
    counts
        .iter()
        .map(|(object_type, count)| object_type.count_token(*count))
        .collect::<Vec<_>>()
        .join("_")
}

/// SHA-256 of the DDL body, hex encoded
pub fn compute_checksum(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ChangeType, ObjectType};
    use chrono::TimeZone;

    #[test]
    fn test_migration_id_format() {
        let records = vec![
            ChangeRecord::new(ObjectType::Column, ChangeType::Added, "dbo", "A").with_table("T"),
            ChangeRecord::new(ObjectType::Table, ChangeType::Added, "dbo", "T"),
            ChangeRecord::new(ObjectType::Column, ChangeType::Added, "dbo", "B").with_table("T"),
            ChangeRecord::new(ObjectType::Constraint, ChangeType::Added, "dbo", "PK_T").with_table("T"),
        ];
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let id = MigrationId::generate(&records, at);

        assert_eq!(id.as_str(), "20240501_093000_1table_2columns_1constraint");
        assert_eq!(id.reverse_filename(), "20240501_093000_1table_2columns_1constraint_reverse.sql");
    }

    #[test]
    fn test_empty_batch_token() {
        assert_eq!(summary_token(&[]), "empty");
    }

    #[test]
    fn test_checksum_consistency() {
        let checksum1 = compute_checksum("DROP TABLE [dbo].[T];");
        let checksum2 = compute_checksum("DROP TABLE [dbo].[T];");

        assert_eq!(checksum1, checksum2);
        assert_eq!(checksum1.len(), 64);
        assert_ne!(checksum1, compute_checksum("DROP TABLE [dbo].[U];"));
    }
}
