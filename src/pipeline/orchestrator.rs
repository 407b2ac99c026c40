//! Migration pipeline
//!
//! Orders a change batch, assembles the forward and reverse scripts under
//! one migration id, and persists them (optionally segmented).

use crate::change::ChangeRecord;
use crate::config::Settings;
use crate::error::MigrateResult;
use crate::pipeline::DependencyResolver;
use crate::script::{MigrationId, ReverseScriptAssembler, ScriptAssembler};
use crate::segment::{ScriptSegmenter, SegmentedScript};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Generated scripts for one batch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationArtifacts {
    pub migration_id: MigrationId,

    /// Forward migration script
    pub forward_sql: String,

    /// Manual rollback script
    pub reverse_sql: String,

    pub forward_filename: String,
    pub reverse_filename: String,

    /// Changes that destroy data
    pub warnings: Vec<String>,

    pub change_count: usize,
    pub generated_at: DateTime<Utc>,
}

/// Where `write_to` put things
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenArtifacts {
    pub forward_path: PathBuf,
    pub reverse_path: PathBuf,
    /// `{dir}/{id}/forward` and `{dir}/{id}/reverse` when segmented
    pub segment_dirs: Option<(PathBuf, PathBuf)>,
}

impl MigrationArtifacts {
    /// Split both scripts into per-object segments
    pub fn segment(&self, segmenter: &ScriptSegmenter) -> (SegmentedScript, SegmentedScript) {
        let forward = segmenter.split(
            &self.forward_sql,
            &self.forward_filename,
            &format!("Forward migration {}", self.migration_id),
        );
        let reverse = segmenter.split(
            &self.reverse_sql,
            &self.reverse_filename,
            &format!("Manual rollback of {}", self.migration_id),
        );
        (forward, reverse)
    }

    /// Write both scripts into `dir`; with a segmenter, also write their
    /// segments under `{dir}/{id}/`
    pub fn write_to(&self, dir: &Path, segmenter: Option<&ScriptSegmenter>) -> MigrateResult<WrittenArtifacts> {
        fs::create_dir_all(dir)?;

        let forward_path = dir.join(&self.forward_filename);
        let reverse_path = dir.join(&self.reverse_filename);
        fs::write(&forward_path, &self.forward_sql)?;
        fs::write(&reverse_path, &self.reverse_sql)?;
        info!("💾 Wrote {} and {}", forward_path.display(), reverse_path.display());

        let segment_dirs = match segmenter {
            Some(segmenter) => {
                let root = dir.join(self.migration_id.as_str());
                let forward_dir = root.join("forward");
                let reverse_dir = root.join("reverse");
                let (forward, reverse) = self.segment(segmenter);
                forward.write_to(&forward_dir)?;
                reverse.write_to(&reverse_dir)?;
                Some((forward_dir, reverse_dir))
            }
            None => None,
        };

        Ok(WrittenArtifacts {
            forward_path,
            reverse_path,
            segment_dirs,
        })
    }
}

/// Batch in, scripts out
pub struct MigrationPipeline {
    settings: Settings,
}

impl MigrationPipeline {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Generate forward and reverse scripts for an unordered batch. An empty
    /// `database` falls back to the configured one.
    pub fn generate(&self, records: &[ChangeRecord], database: &str) -> MigrateResult<MigrationArtifacts> {
        let at = Utc::now();
        let migration_id = MigrationId::generate(records, at);
        self.generate_at(records, database, migration_id, at)
    }

    /// Same as `generate` under a caller-supplied id
    pub fn generate_with_id(
        &self,
        records: &[ChangeRecord],
        database: &str,
        migration_id: MigrationId,
    ) -> MigrateResult<MigrationArtifacts> {
        self.generate_at(records, database, migration_id, Utc::now())
    }

    fn generate_at(
        &self,
        records: &[ChangeRecord],
        database: &str,
        migration_id: MigrationId,
        at: DateTime<Utc>,
    ) -> MigrateResult<MigrationArtifacts> {
        if records.is_empty() {
            warn!("⚠️ Change batch is empty; scripts will only carry bookkeeping");
        }

        let database = if database.trim().is_empty() {
            self.settings.database.as_deref().unwrap_or_default()
        } else {
            database
        };

        let ordered = DependencyResolver::order(records);
        let tables: BTreeSet<(String, String)> =
            ordered.iter().filter_map(ChangeRecord::target_table).collect();

        let forward_sql = ScriptAssembler::new(self.settings.history.clone(), &self.settings.actor)
            .build_at(&ordered, database, &migration_id, at)?;
        let reverse_sql = ReverseScriptAssembler::new(self.settings.history.clone(), &self.settings.actor)
            .build_at(&ordered, database, &migration_id, at)?;

        let warnings: Vec<String> = ordered
            .iter()
            .filter(|r| r.is_destructive())
            .map(|r| r.description())
            .collect();
        for warning in &warnings {
            warn!("⚠️ Destructive change: {}", warning);
        }

        info!(
            "✅ Generated migration {} ({} changes across {} tables)",
            migration_id,
            records.len(),
            tables.len()
        );

        Ok(MigrationArtifacts {
            forward_filename: migration_id.forward_filename(),
            reverse_filename: migration_id.reverse_filename(),
            migration_id,
            forward_sql,
            reverse_sql,
            warnings,
            change_count: records.len(),
            generated_at: at,
        })
    }

    /// Persist artifacts per the output configuration
    pub fn write(&self, artifacts: &MigrationArtifacts) -> MigrateResult<WrittenArtifacts> {
        let segmenter = ScriptSegmenter::new(&self.settings.actor);
        let segmenter = self.settings.output.segment.then_some(&segmenter);
        artifacts.write_to(&self.settings.output.directory, segmenter)
    }
}
