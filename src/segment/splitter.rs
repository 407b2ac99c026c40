//! Script segmenter
//!
//! Splits an assembled script into per-object segments and rebuilds it
//! from them.

use crate::error::{MigrateResult, MigrationError};
use crate::script::is_transaction_check;
use crate::segment::identify::{identify, strip_comments, SegmentKind, StatementOwner};
use crate::segment::manifest::{
    Manifest, ManifestEntry, ManifestSummary, Segment, SegmentedScript, MANIFEST_VERSION,
};
use crate::synthesis::BATCH_SEPARATOR;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, info};

static SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*GO(?:\s+(\d+))?\s*;?\s*$").expect("valid GO separator regex"));

static REFERENTIAL_ACTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bON\s+(?:DELETE|UPDATE)\b").expect("valid referential action regex")
});

static DATA_MODIFICATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:INSERT\s+INTO|UPDATE\s+\S+\s+SET|DELETE\s+FROM|MERGE\s+INTO|TRUNCATE\s+TABLE)\b")
        .expect("valid data modification regex")
});

static LEADING_VERB_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([A-Za-z_]+)").expect("valid leading verb regex"));

/// One batch of a script and the `GO` line that ended it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub text: String,
    /// `GO <count>` repeat count, when one was given
    pub repeat: Option<u32>,
}

impl Batch {
    /// The separator to write back after this batch
    pub fn separator(&self) -> String {
        match self.repeat {
            Some(count) => format!("{} {}", BATCH_SEPARATOR, count),
            None => BATCH_SEPARATOR.to_string(),
        }
    }
}

/// Split a script on `GO` lines; empty batches are dropped
pub fn split_statements(script: &str) -> Vec<String> {
    split_batches(script).into_iter().map(|batch| batch.text).collect()
}

/// Split a script on `GO` lines, keeping any `GO <count>` repeat count
pub fn split_batches(script: &str) -> Vec<Batch> {
    let mut batches = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in script.lines() {
        if let Some(caps) = SEPARATOR_RE.captures(line) {
            let repeat = caps.get(1).and_then(|m| m.as_str().parse().ok());
            push_batch(&mut batches, &current, repeat);
            current.clear();
        } else {
            current.push(line);
        }
    }
    push_batch(&mut batches, &current, None);
    batches
}

fn push_batch(batches: &mut Vec<Batch>, lines: &[&str], repeat: Option<u32>) {
    let text = lines.join("\n");
    let text = text.trim();
    if !text.is_empty() {
        batches.push(Batch {
            text: text.to_string(),
            repeat,
        });
    }
}

/// Statements sharing one owner, in script order
struct Group {
    owner: StatementOwner,
    statements: Vec<Batch>,
}

impl Group {
    fn content(&self) -> String {
        self.statements
            .iter()
            .map(|b| format!("{}\n{}\n", b.text, b.separator()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn operations(&self) -> Vec<String> {
        let mut operations: Vec<String> = Vec::new();
        for statement in &self.statements {
            if is_transaction_check(&statement.text) {
                continue;
            }
            let Some(verb) = leading_verb(&statement.text) else {
                continue;
            };
            if !operations.contains(&verb) {
                operations.push(verb);
            }
        }
        operations
    }

    fn has_data_modification(&self) -> bool {
        self.statements.iter().any(|statement| {
            let code = strip_comments(&statement.text);
            let code = REFERENTIAL_ACTION_RE.replace_all(&code, "");
            DATA_MODIFICATION_RE.is_match(&code)
        })
    }

    fn filename(&self, sequence: usize) -> String {
        let parts: Vec<String> = [&self.owner.schema, &self.owner.name]
            .iter()
            .map(|part| sanitize(part))
            .filter(|part| !part.is_empty())
            .collect();
        format!("{:03}_{}_{}.sql", sequence, self.owner.kind, parts.join("_"))
    }
}

/// First keyword of the statement's code, `RENAME` for `sp_rename` calls
fn leading_verb(statement: &str) -> Option<String> {
    let code = strip_comments(statement);
    let verb = LEADING_VERB_RE.captures(&code)?.get(1)?.as_str().to_ascii_uppercase();
    let verb = match verb.as_str() {
        "EXEC" | "EXECUTE" if code.to_ascii_lowercase().contains("sp_rename") => "RENAME".to_string(),
        "EXECUTE" => "EXEC".to_string(),
        _ => verb,
    };
    Some(verb)
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

pub struct ScriptSegmenter {
    actor: String,
}

impl ScriptSegmenter {
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
        }
    }

    /// Split `script` into per-object segments. `original_script` names the
    /// source file in the manifest.
    pub fn split(&self, script: &str, original_script: &str, description: &str) -> SegmentedScript {
        let statements = split_batches(script);
        let total_statements = statements.len();
        let groups = Self::group(statements);

        let mut summary = ManifestSummary {
            total_statements,
            ..ManifestSummary::default()
        };
        let mut execution_order = Vec::with_capacity(groups.len());
        let mut segments = Vec::with_capacity(groups.len());

        for (i, group) in groups.iter().enumerate() {
            let sequence = i + 1;
            let filename = group.filename(sequence);
            let content = group.content();
            let has_data_modification = group.has_data_modification();

            *summary.segments_by_type.entry(group.owner.kind).or_insert(0) += 1;
            if has_data_modification {
                summary.data_modification_segments += 1;
            }

            debug!(
                "Segment {} holds {} statements for {}.{}",
                filename,
                group.statements.len(),
                group.owner.schema,
                group.owner.name
            );
            execution_order.push(ManifestEntry {
                sequence,
                filename: filename.clone(),
                object_type: group.owner.kind,
                schema: group.owner.schema.clone(),
                object_name: group.owner.name.clone(),
                operations: group.operations(),
                line_count: content.lines().count(),
                has_data_modification,
            });
            segments.push(Segment { filename, content });
        }

        info!(
            "✂️ Split {} into {} segments ({} statements)",
            original_script,
            segments.len(),
            total_statements
        );

        SegmentedScript {
            manifest: Manifest {
                version: MANIFEST_VERSION.to_string(),
                timestamp: Utc::now(),
                actor: self.actor.clone(),
                description: description.to_string(),
                original_script: original_script.to_string(),
                total_segments: segments.len(),
                execution_order,
                summary,
            },
            segments,
        }
    }

    /// Group statements by owner, ordered by first appearance. Runs of
    /// consecutive unidentified statements each become their own group.
    /// A transaction check stays with the statement it follows.
    fn group(statements: Vec<Batch>) -> Vec<Group> {
        let mut groups: Vec<Group> = Vec::new();
        let mut by_key: HashMap<(String, String), usize> = HashMap::new();
        let mut open_run: Option<usize> = None;
        let mut last: Option<usize> = None;
        let mut runs = 0;

        for statement in statements {
            if let Some(i) = last.filter(|_| is_transaction_check(&statement.text)) {
                groups[i].statements.push(statement);
                continue;
            }

            let index = match identify(&statement.text) {
                Some(owner) => {
                    open_run = None;
                    match by_key.get(&owner.key()) {
                        Some(&i) => i,
                        None => {
                            by_key.insert(owner.key(), groups.len());
                            groups.push(Group {
                                owner,
                                statements: Vec::new(),
                            });
                            groups.len() - 1
                        }
                    }
                }
                None => match open_run {
                    Some(i) => i,
                    None => {
                        runs += 1;
                        open_run = Some(groups.len());
                        groups.push(Group {
                            owner: StatementOwner {
                                kind: SegmentKind::Script,
                                schema: String::new(),
                                name: format!("block{:02}", runs),
                            },
                            statements: Vec::new(),
                        });
                        groups.len() - 1
                    }
                },
            };
            groups[index].statements.push(statement);
            last = Some(index);
        }
        groups
    }

    /// Concatenate segments in manifest execution order
    pub fn reconstruct(manifest: &Manifest, segments: &[Segment]) -> MigrateResult<String> {
        let mut entries: Vec<&ManifestEntry> = manifest.execution_order.iter().collect();
        entries.sort_by_key(|entry| entry.sequence);

        let mut parts = Vec::with_capacity(entries.len());
        for entry in entries {
            let segment = segments
                .iter()
                .find(|s| s.filename == entry.filename)
                .ok_or_else(|| MigrationError::MissingSegment(entry.filename.clone()))?;
            parts.push(segment.content.as_str());
        }

        debug!("Reconstructed {} from {} segments", manifest.original_script, parts.len());
        Ok(parts.join("\n"))
    }
}
