//! Script segmentation
//!
//! Per-object slices of an assembled script plus the JSON manifest that
//! indexes them.

mod identify;
mod manifest;
mod splitter;

pub use identify::{identify, strip_comments, SegmentKind, StatementOwner};
pub use manifest::{
    load_segments, Manifest, ManifestEntry, ManifestSummary, Segment, SegmentedScript, MANIFEST_FILE,
};
pub use splitter::{split_batches, split_statements, Batch, ScriptSegmenter};
