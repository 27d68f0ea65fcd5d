//! Three-way merge driver for exported JSONL files.
//!
//! Git invokes it per conflicted file as
//! `kota merge-driver %O %A %B %L` (base, ours, theirs, marker size). Rows
//! are merged by `id`, not by line:
//!
//! - an id present in theirs takes theirs' line;
//! - otherwise an id present in ours keeps ours' line;
//! - an id only in base was deleted on both sides and is dropped.
//!
//! Concurrent edits to the same id therefore resolve to the remote version.
//! Real deletes travel through the deletion manifest, not through this merge.
//! The result is sorted by id (byte order, like the exporter's `ORDER BY id`)
//! and atomically written over the ours file.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::sync::file::{atomic_write, join_lines};
use crate::sync::types::{SyncError, SyncResult};

/// Which input a row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Base,
    Ours,
    Theirs,
}

impl Side {
    const fn label(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Ours => "ours",
            Self::Theirs => "theirs",
        }
    }
}

/// Counts describing one merge.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    /// Rows in the merged output.
    pub rows: usize,
    /// Rows taken from theirs.
    pub from_theirs: usize,
    /// Rows kept from ours because theirs lacks them.
    pub from_ours: usize,
    /// Base rows absent from both sides.
    pub dropped: usize,
    /// Lines without a usable id (or not JSON), across all inputs.
    pub invalid_lines: usize,
}

/// Extract the row id as a string; numbers are rendered in decimal.
fn row_id(line: &str) -> Option<String> {
    let value: Value = serde_json::from_str(line).ok()?;
    match value.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_side(text: &str, side: Side, invalid: &mut usize) -> BTreeMap<String, String> {
    let mut rows = BTreeMap::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match row_id(line) {
            Some(id) => {
                if rows.insert(id.clone(), line.to_string()).is_some() {
                    warn!(side = side.label(), line = idx + 1, id = %id, "Duplicate id, keeping last");
                }
            }
            None => {
                warn!(side = side.label(), line = idx + 1, "Dropping line without an id");
                *invalid += 1;
            }
        }
    }
    rows
}

/// Merge three JSONL texts, returning the merged text and its statistics.
#[must_use]
pub fn merge_jsonl(base: &str, ours: &str, theirs: &str) -> (String, MergeOutcome) {
    let mut outcome = MergeOutcome::default();
    let base = parse_side(base, Side::Base, &mut outcome.invalid_lines);
    let mut merged = parse_side(ours, Side::Ours, &mut outcome.invalid_lines);
    let theirs = parse_side(theirs, Side::Theirs, &mut outcome.invalid_lines);

    outcome.from_ours = merged.keys().filter(|id| !theirs.contains_key(*id)).count();
    outcome.from_theirs = theirs.len();
    outcome.dropped = base
        .keys()
        .filter(|id| !merged.contains_key(*id) && !theirs.contains_key(*id))
        .count();

    merged.extend(theirs);
    outcome.rows = merged.len();

    let lines: Vec<String> = merged.into_values().collect();
    (join_lines(&lines), outcome)
}

fn read_input(path: &Path) -> SyncResult<String> {
    fs::read_to_string(path).map_err(|source| SyncError::MergeInput {
        path: path.display().to_string(),
        source,
    })
}

/// Merge the files at `base`, `ours` and `theirs`, writing the result to `ours`.
///
/// # Errors
///
/// Returns `MergeInput` if an input cannot be read, or an IO error if the
/// result cannot be written. `ours` is untouched on error.
pub fn merge_files(base: &Path, ours: &Path, theirs: &Path) -> SyncResult<MergeOutcome> {
    let base_text = read_input(base)?;
    let ours_text = read_input(ours)?;
    let theirs_text = read_input(theirs)?;

    let (merged, outcome) = merge_jsonl(&base_text, &ours_text, &theirs_text);
    atomic_write(ours, &merged)?;

    info!(
        path = %ours.display(),
        rows = outcome.rows,
        from_theirs = outcome.from_theirs,
        from_ours = outcome.from_ours,
        dropped = outcome.dropped,
        "Merged JSONL"
    );
    Ok(outcome)
}
