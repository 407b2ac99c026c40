//! Script assemblers
//!
//! Wrap an ordered batch into one transactional T-SQL script: header,
//! idempotency guard, four DDL phases, history bookkeeping and commit.
//! `ScriptAssembler` builds the forward migration, `ReverseScriptAssembler`
//! its manual rollback twin.

use crate::change::{ChangeRecord, ChangeType};
use crate::config::HistoryTableConfig;
use crate::error::{MigrateResult, MigrationError};
use crate::script::header::{compute_checksum, summary_token, MigrationId};
use crate::script::writer::{Guard, ScriptWriter};
use crate::synthesis::{ObjectDdlSynthesizer, ReverseDdlSynthesizer};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

// =============================================================================
// Phase grouping
// =============================================================================

/// Records split into the four emission phases, each keeping batch order
struct Phases<'a> {
    renames: Vec<&'a ChangeRecord>,
    drops: Vec<&'a ChangeRecord>,
    modifications: Vec<&'a ChangeRecord>,
    creates: Vec<&'a ChangeRecord>,
}

impl<'a> Phases<'a> {
    fn group(records: &'a [ChangeRecord]) -> Self {
        let mut phases = Phases {
            renames: Vec::new(),
            drops: Vec::new(),
            modifications: Vec::new(),
            creates: Vec::new(),
        };
        for record in records {
            if record.is_rename() {
                phases.renames.push(record);
                continue;
            }
            match record.change_type {
                ChangeType::Deleted => phases.drops.push(record),
                ChangeType::Modified => phases.modifications.push(record),
                ChangeType::Added => phases.creates.push(record),
            }
        }
        phases
    }

    fn reversed(records: &[&'a ChangeRecord]) -> Vec<&'a ChangeRecord> {
        records.iter().rev().copied().collect()
    }
}

fn header_lines(
    title: &str,
    migration_id: &MigrationId,
    database: &str,
    actor: &str,
    at: DateTime<Utc>,
    records: &[ChangeRecord],
) -> Vec<String> {
    vec![
        title.to_string(),
        format!("Migration: {}", migration_id),
        format!(
            "Database: {}",
            if database.trim().is_empty() { "(current connection)" } else { database }
        ),
        format!("Generated: {}", at.to_rfc3339()),
        format!("Generated by: {}", actor),
        format!("Changes: {} ({})", records.len(), summary_token(records)),
    ]
}

// =============================================================================
// Forward
// =============================================================================

/// Builds forward migration scripts
pub struct ScriptAssembler {
    history: HistoryTableConfig,
    actor: String,
}

impl ScriptAssembler {
    pub fn new(history: HistoryTableConfig, actor: impl Into<String>) -> Self {
        Self {
            history,
            actor: actor.into(),
        }
    }

    /// Build a script for an already-ordered batch, deriving the id from the
    /// current time
    pub fn build(&self, ordered: &[ChangeRecord], database: &str) -> MigrateResult<String> {
        let at = Utc::now();
        let migration_id = MigrationId::generate(ordered, at);
        self.build_at(ordered, database, &migration_id, at)
    }

    /// Build a script under a caller-supplied id
    pub fn build_with_id(
        &self,
        ordered: &[ChangeRecord],
        database: &str,
        migration_id: &MigrationId,
    ) -> MigrateResult<String> {
        self.build_at(ordered, database, migration_id, Utc::now())
    }

    pub(crate) fn build_at(
        &self,
        ordered: &[ChangeRecord],
        database: &str,
        migration_id: &MigrationId,
        at: DateTime<Utc>,
    ) -> MigrateResult<String> {
        info!("📝 Assembling migration {} ({} changes)", migration_id, ordered.len());

        let mut writer = ScriptWriter::new(&self.history, migration_id);
        writer.banner(&header_lines(
            "SchemaFlow migration",
            migration_id,
            database,
            &self.actor,
            at,
            ordered,
        ));
        writer.warnings(ordered);
        writer.open_transaction(database);
        writer.guard(Guard::SkipIfApplied);

        if let Err(cause) = Self::emit_phases(&mut writer, ordered) {
            let err = writer.abort(cause);
            err.log();
            return Err(err);
        }

        let checksum = compute_checksum(writer.body());
        debug!("Migration {} body checksum {}", migration_id, checksum);
        writer.record_history(&checksum);

        Ok(writer.commit())
    }

    /// Renames, drops, modifications, creates
    fn emit_phases(writer: &mut ScriptWriter<'_>, ordered: &[ChangeRecord]) -> Result<(), MigrationError> {
        let phases = Phases::group(ordered);
        let synthesize = |record: &ChangeRecord| ObjectDdlSynthesizer::generate(record, ordered);
        let describe = ChangeRecord::description;

        writer.phase("Phase 1: Renames", &phases.renames, synthesize, describe)?;
        writer.phase("Phase 2: Drops", &phases.drops, synthesize, describe)?;
        writer.phase("Phase 3: Modifications", &phases.modifications, synthesize, describe)?;
        writer.phase("Phase 4: Creates", &phases.creates, synthesize, describe)
    }
}

// =============================================================================
// Reverse
// =============================================================================

/// Builds manual rollback scripts. The result never registers itself in
/// the history table; un-recording the migration is left to the operator.
pub struct ReverseScriptAssembler {
    history: HistoryTableConfig,
    actor: String,
}

impl ReverseScriptAssembler {
    pub fn new(history: HistoryTableConfig, actor: impl Into<String>) -> Self {
        Self {
            history,
            actor: actor.into(),
        }
    }

    /// Build the rollback for a forward batch in its execution order
    pub fn build(
        &self,
        ordered: &[ChangeRecord],
        database: &str,
        migration_id: &MigrationId,
    ) -> MigrateResult<String> {
        self.build_at(ordered, database, migration_id, Utc::now())
    }

    pub(crate) fn build_at(
        &self,
        ordered: &[ChangeRecord],
        database: &str,
        migration_id: &MigrationId,
        at: DateTime<Utc>,
    ) -> MigrateResult<String> {
        info!("⏪ Assembling rollback for {} ({} changes)", migration_id, ordered.len());

        let mut writer = ScriptWriter::new(&self.history, migration_id);
        let mut lines = header_lines(
            "MANUAL ROLLBACK - not tracked in history",
            migration_id,
            database,
            &self.actor,
            at,
            ordered,
        );
        lines.push("Review before running: data removed by the forward migration is not restored.".to_string());
        writer.banner(&lines);
        writer.line("");
        writer.open_transaction(database);
        writer.guard(Guard::SkipIfNotApplied);

        if let Err(cause) = Self::emit_phases(&mut writer, ordered) {
            let err = writer.abort(cause);
            err.log();
            return Err(err);
        }

        writer.manual_unrecord();
        Ok(writer.commit())
    }

    /// Forward phases mirrored: creates undone last-first, modifications
    /// restored, drops recreated last-first, renames undone last-first
    fn emit_phases(writer: &mut ScriptWriter<'_>, ordered: &[ChangeRecord]) -> Result<(), MigrationError> {
        let phases = Phases::group(ordered);
        let synthesize = |record: &ChangeRecord| ReverseDdlSynthesizer::generate(record, ordered);
        let describe = |record: &ChangeRecord| record.inverted().description();

        writer.phase("Phase 1: Undo creates", &Phases::reversed(&phases.creates), synthesize, describe)?;
        writer.phase("Phase 2: Undo modifications", &phases.modifications, synthesize, describe)?;
        writer.phase("Phase 3: Undo drops", &Phases::reversed(&phases.drops), synthesize, describe)?;
        writer.phase("Phase 4: Undo renames", &Phases::reversed(&phases.renames), synthesize, describe)
    }
}
