//! Script text builder shared by the forward and reverse assemblers

use crate::change::ChangeRecord;
use crate::config::HistoryTableConfig;
use crate::error::MigrationError;
use crate::script::header::MigrationId;
use crate::synthesis::patterns::{quote_ident, sql_literal};
use crate::synthesis::BATCH_SEPARATOR;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write as _;

static TRANSACTION_CHECK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*IF\s+@@TRANCOUNT\s*=\s*0\b").expect("valid transaction check regex")
});

/// Whether `batch` is the check emitted after every DDL batch
pub fn is_transaction_check(batch: &str) -> bool {
    TRANSACTION_CHECK_RE.is_match(batch)
}

const RULE: &str = "-- =============================================";
const PHASE_RULE: &str = "-- ---------------------------------------------";

/// Which way the guard checks the history table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// Skip when the migration is already recorded
    SkipIfApplied,
    /// Skip when the migration was never recorded
    SkipIfNotApplied,
}

pub struct ScriptWriter<'a> {
    history: &'a HistoryTableConfig,
    migration_id: &'a MigrationId,
    script: String,
    body_start: Option<usize>,
    statements: usize,
}

impl<'a> ScriptWriter<'a> {
    pub fn new(history: &'a HistoryTableConfig, migration_id: &'a MigrationId) -> Self {
        Self {
            history,
            migration_id,
            script: String::new(),
            body_start: None,
            statements: 0,
        }
    }

    pub fn line(&mut self, text: &str) {
        self.script.push_str(text);
        self.script.push('\n');
    }

    fn end_batch(&mut self) {
        self.line(BATCH_SEPARATOR);
        self.script.push('\n');
    }

    /// Boxed comment header
    pub fn banner(&mut self, lines: &[String]) {
        self.line(RULE);
        for text in lines {
            let _ = writeln!(self.script, "-- {}", text);
        }
        self.line(RULE);
    }

    /// Data-loss warnings for destructive records
    pub fn warnings(&mut self, records: &[ChangeRecord]) {
        let destructive: Vec<String> = records
            .iter()
            .filter(|r| r.is_destructive())
            .map(|r| r.description())
            .collect();
        if destructive.is_empty() {
            self.script.push('\n');
            return;
        }
        self.line("-- WARNING: the following changes destroy data:");
        for description in destructive {
            let _ = writeln!(self.script, "--   {}", description);
        }
        self.script.push('\n');
    }

    /// `USE`, `SET XACT_ABORT ON`, `BEGIN TRANSACTION`
    pub fn open_transaction(&mut self, database: &str) {
        if !database.trim().is_empty() {
            let _ = writeln!(self.script, "USE {};", quote_ident(database));
            self.end_batch();
        }
        self.line("SET XACT_ABORT ON;");
        self.line("BEGIN TRANSACTION;");
        self.end_batch();
    }

    /// History check. `SET NOEXEC ON` keeps the remaining GO-batches from
    /// running once the guard fires; `RETURN` alone only leaves one batch.
    pub fn guard(&mut self, guard: Guard) {
        let (condition, message) = match guard {
            Guard::SkipIfApplied => ("IF EXISTS", "Migration already applied"),
            Guard::SkipIfNotApplied => ("IF NOT EXISTS", "Migration not applied, nothing to roll back"),
        };
        let _ = writeln!(
            self.script,
            "{} (SELECT 1 FROM {} WHERE [MigrationId] = N'{}')",
            condition,
            self.history.qualified(),
            sql_literal(self.migration_id.as_str())
        );
        self.line("BEGIN");
        let _ = writeln!(
            self.script,
            "    PRINT '{}: {}';",
            message,
            sql_literal(self.migration_id.as_str())
        );
        self.line("    COMMIT TRANSACTION;");
        self.line("    SET NOEXEC ON;");
        self.line("    RETURN;");
        self.line("END");
        self.end_batch();
        self.body_start = Some(self.script.len());
    }

    /// Emit one phase. Records are validated as they are emitted; the first
    /// invalid record aborts the phase. `describe` labels each statement
    /// the way this script's direction sees the record.
    pub fn phase<F, D>(
        &mut self,
        title: &str,
        records: &[&ChangeRecord],
        synthesize: F,
        describe: D,
    ) -> Result<(), MigrationError>
    where
        F: Fn(&ChangeRecord) -> String,
        D: Fn(&ChangeRecord) -> String,
    {
        if records.is_empty() {
            return Ok(());
        }

        self.line(PHASE_RULE);
        let _ = writeln!(self.script, "-- {} ({})", title, records.len());
        self.line(PHASE_RULE);

        for &record in records {
            record.validate()?;
            self.statements += 1;
            let _ = writeln!(self.script, "-- {}. {}", self.statements, describe(record));
            self.ddl(&synthesize(record));
        }
        Ok(())
    }

    /// Write synthesized DDL batch by batch, each followed by a check
    fn ddl(&mut self, ddl: &str) {
        let mut batch: Vec<&str> = Vec::new();
        for line in ddl.trim_end().lines() {
            if line.trim().eq_ignore_ascii_case(BATCH_SEPARATOR) {
                self.ddl_batch(&batch);
                batch.clear();
            } else {
                batch.push(line);
            }
        }
        self.ddl_batch(&batch);
    }

    fn ddl_batch(&mut self, lines: &[&str]) {
        let text = lines.join("\n");
        let text = text.trim_end();
        if text.trim().is_empty() {
            return;
        }
        self.line(text);
        self.end_batch();

        let comments_only = lines
            .iter()
            .all(|l| l.trim().is_empty() || l.trim_start().starts_with("--"));
        if !comments_only {
            self.transaction_check();
        }
    }

    /// A failed batch under `XACT_ABORT` rolls the transaction back but
    /// only ends its own batch; later batches would run in autocommit.
    /// Switch execution off once the transaction is gone.
    fn transaction_check(&mut self) {
        self.line("IF @@TRANCOUNT = 0");
        self.line("BEGIN");
        let _ = writeln!(
            self.script,
            "    PRINT 'Migration failed, remaining batches skipped: {}';",
            sql_literal(self.migration_id.as_str())
        );
        self.line("    SET NOEXEC ON;");
        self.line("END");
        self.end_batch();
    }

    /// DDL emitted after the guard, used for the history checksum
    pub fn body(&self) -> &str {
        match self.body_start {
            Some(start) => &self.script[start..],
            None => "",
        }
    }

    /// Record the migration in the history table
    pub fn record_history(&mut self, checksum: &str) {
        let _ = writeln!(
            self.script,
            "INSERT INTO {} ([MigrationId], [Filename], [AppliedDate], [Checksum], [Status], [ExecutionTime], [ErrorMessage])",
            self.history.qualified()
        );
        let _ = writeln!(
            self.script,
            "VALUES (N'{}', N'{}', SYSUTCDATETIME(), N'{}', N'Success', 0, NULL);",
            sql_literal(self.migration_id.as_str()),
            sql_literal(&self.migration_id.forward_filename()),
            checksum
        );
        self.end_batch();
    }

    /// Commented-out removal of the history row, for manual rollbacks
    pub fn manual_unrecord(&mut self) {
        self.line("-- This rollback does not touch the history table. Once verified, un-record the migration:");
        let _ = writeln!(
            self.script,
            "-- DELETE FROM {} WHERE [MigrationId] = N'{}';",
            self.history.qualified(),
            sql_literal(self.migration_id.as_str())
        );
        self.script.push('\n');
    }

    pub fn commit(mut self) -> String {
        self.line("COMMIT TRANSACTION;");
        self.end_batch();
        self.line("SET NOEXEC OFF;");
        self.line(BATCH_SEPARATOR);
        self.script
    }

    /// Terminate the partial script with a rollback and wrap the failure
    pub fn abort(mut self, cause: MigrationError) -> MigrationError {
        self.line("ROLLBACK TRANSACTION;");
        self.line(BATCH_SEPARATOR);
        MigrationError::Generation {
            migration_id: self.migration_id.to_string(),
            partial_script: self.script,
            message: cause.to_string(),
        }
    }
}
