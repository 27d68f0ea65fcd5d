//! `kota merge-driver`: git's entry point into the JSONL merge.
//!
//! Git runs `kota merge-driver %O %A %B %L`. Exit 0 means the file at `%A`
//! now holds the resolved content; any other status leaves git's own conflict
//! handling in charge. No database is opened.

use std::path::Path;

use crate::error::Result;
use crate::sync::merge_files;

/// Execute the merge driver.
///
/// # Errors
///
/// Returns a sync error if an input is unreadable or the result cannot be
/// written; `ours` is left untouched in that case.
pub fn execute(
    base: &Path,
    ours: &Path,
    theirs: &Path,
    marker_size: Option<u32>,
    json: bool,
) -> Result<()> {
    tracing::debug!(?marker_size, "Merge driver invoked");
    let outcome = merge_files(base, ours, theirs)?;

    if json {
        println!("{}", serde_json::to_string(&outcome)?);
    }
    Ok(())
}
