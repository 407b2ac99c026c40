//! Change batch loading
//!
//! Reads the (already overlay-filtered) change feed from JSON.

use crate::change::{ChangeRecord, ObjectType};
use crate::error::MigrateResult;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Parse and validate a JSON array of change records
pub fn parse_batch(json: &str) -> MigrateResult<Vec<ChangeRecord>> {
    let records: Vec<ChangeRecord> = serde_json::from_str(json)?;
    for record in &records {
        record.validate()?;
        debug!("Loaded change: {}", record.description());
    }
    Ok(records)
}

/// Load a change batch from a JSON file
pub fn load_batch(path: &Path) -> MigrateResult<Vec<ChangeRecord>> {
    let content = std::fs::read_to_string(path)?;
    let records = parse_batch(&content)?;
    info!("📥 Loaded {} changes from {}", records.len(), path.display());
    Ok(records)
}

/// Count records per object type, in `ObjectType` order
pub fn count_by_type(records: &[ChangeRecord]) -> BTreeMap<ObjectType, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.object_type).or_insert(0) += 1;
    }
    counts
}
