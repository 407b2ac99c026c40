//! Segment manifest and on-disk layout
//!
//! A segmented script is a directory of numbered `.sql` files plus a
//! `manifest.json` describing their execution order.

use crate::error::{MigrateResult, MigrationError};
use crate::segment::identify::SegmentKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_VERSION: &str = "1.0";

/// One segment in execution order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub sequence: usize,
    pub filename: String,
    pub object_type: SegmentKind,
    pub schema: String,
    pub object_name: String,
    /// Distinct leading verbs (CREATE, ALTER, DROP, EXEC, ...) in first-seen order
    pub operations: Vec<String>,
    pub line_count: usize,
    pub has_data_modification: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestSummary {
    pub total_statements: usize,
    pub segments_by_type: BTreeMap<SegmentKind, usize>,
    pub data_modification_segments: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub description: String,
    pub original_script: String,
    pub total_segments: usize,
    pub execution_order: Vec<ManifestEntry>,
    pub summary: ManifestSummary,
}

/// Segment file body keyed by its manifest filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub filename: String,
    pub content: String,
}

/// Result of splitting a script
#[derive(Debug, Clone)]
pub struct SegmentedScript {
    pub manifest: Manifest,
    pub segments: Vec<Segment>,
}

impl SegmentedScript {
    /// Write every segment and `manifest.json` into `dir`
    pub fn write_to(&self, dir: &Path) -> MigrateResult<()> {
        fs::create_dir_all(dir)?;
        for segment in &self.segments {
            fs::write(dir.join(&segment.filename), &segment.content)?;
            debug!("Wrote segment {}", segment.filename);
        }
        let manifest = serde_json::to_string_pretty(&self.manifest)?;
        fs::write(dir.join(MANIFEST_FILE), manifest)?;

        info!(
            "📦 Wrote {} segments to {}",
            self.segments.len(),
            dir.display()
        );
        Ok(())
    }
}

/// Read `manifest.json` and every segment file present in `dir`.
/// Files the manifest names but which are missing are left out; rebuilding
/// the script reports them.
pub fn load_segments(dir: &Path) -> MigrateResult<SegmentedScript> {
    let raw = fs::read_to_string(dir.join(MANIFEST_FILE)).map_err(|e| {
        MigrationError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", dir.join(MANIFEST_FILE).display(), e),
        ))
    })?;
    let manifest: Manifest = serde_json::from_str(&raw)?;

    let mut segments = Vec::with_capacity(manifest.execution_order.len());
    for entry in &manifest.execution_order {
        let path = dir.join(&entry.filename);
        if !path.is_file() {
            debug!("Segment {} not found in {}", entry.filename, dir.display());
            continue;
        }
        segments.push(Segment {
            filename: entry.filename.clone(),
            content: fs::read_to_string(&path)?,
        });
    }

    info!(
        "📥 Loaded {}/{} segments from {}",
        segments.len(),
        manifest.total_segments,
        dir.display()
    );
    Ok(SegmentedScript { manifest, segments })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::ScriptSegmenter;
    use pretty_assertions::assert_eq;

    const SCRIPT: &str = "SET XACT_ABORT ON;\nBEGIN TRANSACTION;\nGO\n\
        CREATE TABLE [dbo].[Audit] ([Id] INT NOT NULL);\nGO\n\
        CREATE VIEW [dbo].[vAudit] AS SELECT [Id] FROM [dbo].[Audit];\nGO\n\
        COMMIT TRANSACTION;\nGO\n";

    #[test]
    fn test_manifest_uses_camel_case_keys() {
        let segmented = ScriptSegmenter::new("tester").split(SCRIPT, "m1.sql", "test");
        let json = serde_json::to_value(&segmented.manifest).unwrap();

        assert_eq!(json["originalScript"], "m1.sql");
        assert_eq!(json["totalSegments"], 4);
        assert_eq!(json["executionOrder"][1]["objectType"], "Table");
        assert_eq!(json["executionOrder"][1]["filename"], "002_Table_dbo_Audit.sql");
        assert!(json["executionOrder"][0]["hasDataModification"].is_boolean());
    }

    #[test]
    fn test_write_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let segmented = ScriptSegmenter::new("tester").split(SCRIPT, "m1.sql", "test");
        segmented.write_to(dir.path()).unwrap();

        assert!(dir.path().join(MANIFEST_FILE).is_file());
        assert!(dir.path().join("003_View_dbo_vAudit.sql").is_file());

        let loaded = load_segments(dir.path()).unwrap();
        assert_eq!(loaded.manifest, segmented.manifest);
        assert_eq!(loaded.segments, segmented.segments);
    }

    #[test]
    fn test_missing_manifest_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_segments(dir.path()), Err(MigrationError::Io(_))));
    }

    #[test]
    fn test_missing_segment_file_is_skipped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let segmented = ScriptSegmenter::new("tester").split(SCRIPT, "m1.sql", "test");
        segmented.write_to(dir.path()).unwrap();
        std::fs::remove_file(dir.path().join("002_Table_dbo_Audit.sql")).unwrap();

        let loaded = load_segments(dir.path()).unwrap();
        assert_eq!(loaded.segments.len(), 3);
        assert!(matches!(
            ScriptSegmenter::reconstruct(&loaded.manifest, &loaded.segments),
            Err(MigrationError::MissingSegment(name)) if name == "002_Table_dbo_Audit.sql"
        ));
    }
}
