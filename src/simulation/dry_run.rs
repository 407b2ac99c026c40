//! History simulator
//!
//! Replays an assembled script against an in-memory migration history,
//! batch by batch, to check guard and bookkeeping behavior without a
//! database. Only history statements, transaction control and the
//! post-batch transaction checks are interpreted; every other batch is
//! recorded as executed. History writes made inside a transaction only
//! land on COMMIT.

use crate::config::HistoryTableConfig;
use crate::script::is_transaction_check;
use crate::segment::{split_statements, strip_comments};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

static GUARD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)^\s*IF\s+(NOT\s+)?EXISTS\s*\(\s*SELECT\s+1\s+FROM\s+(\S+)\s+WHERE\s+\[?MigrationId\]?\s*=\s*N?'((?:[^']|'')*)'\s*\)",
    )
    .expect("valid history guard regex")
});

static INSERT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\bINSERT\s+INTO\s+(\S+)\s*\([^)]*\)\s*VALUES\s*\(\s*N?'((?:[^']|'')*)'")
        .expect("valid history insert regex")
});

static DELETE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\bDELETE\s+FROM\s+(\S+)\s+WHERE\s+\[?MigrationId\]?\s*=\s*N?'((?:[^']|'')*)'")
        .expect("valid history delete regex")
});

static PRINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bPRINT\s+N?'((?:[^']|'')*)'").expect("valid PRINT regex"));

static NOEXEC_ON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bSET\s+NOEXEC\s+ON\b").expect("valid NOEXEC regex"));

static BEGIN_TRAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bBEGIN\s+TRAN(?:SACTION)?\b").expect("valid BEGIN TRAN regex"));

static COMMIT_TRAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bCOMMIT(?:\s+TRAN(?:SACTION)?)?\b").expect("valid COMMIT regex"));

static ROLLBACK_TRAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bROLLBACK(?:\s+TRAN(?:SACTION)?)?\b").expect("valid ROLLBACK regex")
});

/// A history write waiting for its transaction to commit
#[derive(Debug, Clone)]
enum HistoryWrite {
    Record(String),
    Unrecord(String),
}

/// Outcome of one simulated script run
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    /// A guard fired and switched execution off
    pub halted: bool,
    /// `PRINT` output in order
    pub output: Vec<String>,
    /// Batches that would have run, comments removed
    pub executed_batches: Vec<String>,
    /// Ids inserted into the history table
    pub recorded: Vec<String>,
    /// Ids deleted from the history table
    pub unrecorded: Vec<String>,
    /// Batches that raised an error and rolled the transaction back
    pub failed_batches: Vec<String>,
}

pub struct HistorySimulator {
    history: HistoryTableConfig,
    applied: BTreeSet<String>,
    failing: Option<String>,
    trancount: usize,
    pending: Vec<HistoryWrite>,
}

impl HistorySimulator {
    pub fn new(history: HistoryTableConfig) -> Self {
        Self::with_applied(history, Vec::<String>::new())
    }

    /// Start from a history that already lists `ids`
    pub fn with_applied<I, S>(history: HistoryTableConfig, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            history,
            applied: ids.into_iter().map(Into::into).collect(),
            failing: None,
            trancount: 0,
            pending: Vec::new(),
        }
    }

    /// Make any batch containing `needle` fail as it would under
    /// `XACT_ABORT ON`: the open transaction is rolled back
    pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
        self.failing = Some(needle.into());
        self
    }

    pub fn is_applied(&self, migration_id: &str) -> bool {
        self.applied.contains(migration_id)
    }

    pub fn applied(&self) -> impl Iterator<Item = &str> {
        self.applied.iter().map(String::as_str)
    }

    /// Run `script` batch by batch
    pub fn apply(&mut self, script: &str) -> SimulationResult {
        let mut result = SimulationResult::default();
        self.trancount = 0;
        self.pending.clear();

        for batch in split_statements(script) {
            let code = strip_comments(&batch);
            if code.trim().is_empty() {
                continue;
            }

            if let Some(caps) = GUARD_RE.captures(&code) {
                let negated = caps.get(1).is_some();
                let table = caps.get(2).map_or("", |m| m.as_str());
                let id = unescape(caps.get(3).map_or("", |m| m.as_str()));
                if !self.is_history_table(table) {
                    result.executed_batches.push(code.clone());
                    continue;
                }

                let fires = self.applied.contains(&id) != negated;
                debug!("Guard on {} ({}exists): fires = {}", id, if negated { "not " } else { "" }, fires);
                if fires {
                    collect_prints(&code, &mut result.output);
                    self.commit(&mut result);
                    if NOEXEC_ON_RE.is_match(&code) {
                        result.halted = true;
                        break;
                    }
                }
                continue;
            }

            if is_transaction_check(&code) {
                if self.trancount == 0 {
                    debug!("Transaction is gone; execution switched off");
                    collect_prints(&code, &mut result.output);
                    if NOEXEC_ON_RE.is_match(&code) {
                        result.halted = true;
                        break;
                    }
                }
                continue;
            }

            if self.failing.as_deref().is_some_and(|needle| code.contains(needle)) {
                debug!("Batch failed; rolling back {} pending history writes", self.pending.len());
                self.rollback();
                result.failed_batches.push(code);
                continue;
            }

            if let Some(caps) = INSERT_RE.captures(&code) {
                if self.is_history_table(caps.get(1).map_or("", |m| m.as_str())) {
                    let id = unescape(caps.get(2).map_or("", |m| m.as_str()));
                    self.write(HistoryWrite::Record(id), &mut result);
                    continue;
                }
            }

            if let Some(caps) = DELETE_RE.captures(&code) {
                if self.is_history_table(caps.get(1).map_or("", |m| m.as_str())) {
                    let id = unescape(caps.get(2).map_or("", |m| m.as_str()));
                    self.write(HistoryWrite::Unrecord(id), &mut result);
                    continue;
                }
            }

            if ROLLBACK_TRAN_RE.is_match(&code) {
                self.rollback();
            } else if COMMIT_TRAN_RE.is_match(&code) {
                self.commit(&mut result);
            } else if BEGIN_TRAN_RE.is_match(&code) {
                self.trancount += 1;
            }

            collect_prints(&code, &mut result.output);
            result.executed_batches.push(code);
        }

        info!(
            "🧪 Simulated run: {} batches executed, {} recorded, halted = {}",
            result.executed_batches.len(),
            result.recorded.len(),
            result.halted
        );
        result
    }

    /// Apply a history write now in autocommit, or on COMMIT otherwise
    fn write(&mut self, write: HistoryWrite, result: &mut SimulationResult) {
        if self.trancount > 0 {
            self.pending.push(write);
        } else {
            self.land(write, result);
        }
    }

    fn commit(&mut self, result: &mut SimulationResult) {
        self.trancount = 0;
        for write in std::mem::take(&mut self.pending) {
            self.land(write, result);
        }
    }

    fn rollback(&mut self) {
        self.trancount = 0;
        self.pending.clear();
    }

    fn land(&mut self, write: HistoryWrite, result: &mut SimulationResult) {
        match write {
            HistoryWrite::Record(id) => {
                self.applied.insert(id.clone());
                result.recorded.push(id);
            }
            HistoryWrite::Unrecord(id) => {
                self.applied.remove(&id);
                result.unrecorded.push(id);
            }
        }
    }

    fn is_history_table(&self, table: &str) -> bool {
        normalize_table(table) == normalize_table(&self.history.qualified())
    }
}

fn collect_prints(code: &str, output: &mut Vec<String>) {
    output.extend(
        PRINT_RE
            .captures_iter(code)
            .filter_map(|caps| caps.get(1))
            .map(|m| unescape(m.as_str())),
    );
}

/// `[dbo].[MigrationHistory]` and `dbo.migrationhistory` compare equal
fn normalize_table(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '[' && *c != ']')
        .collect::<String>()
        .to_lowercase()
}

fn unescape(literal: &str) -> String {
    literal.replace("''", "'")
}
