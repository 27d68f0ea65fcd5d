//! Deletion manifest.
//!
//! Snapshot exports cannot express deletes: a row missing from a JSONL file
//! looks the same as a row that never existed. Every tombstoned remove
//! therefore appends `{table, id, deleted_at}` to `.deletions.jsonl` in the
//! export directory, which is committed alongside the table files and
//! applied by peers before their next import upserts.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use rusqlite::Transaction;
use tracing::{debug, info, warn};

use crate::storage::rows::delete_ids;
use crate::storage::SqliteStorage;
use crate::sync::file::{append_line, atomic_write, file_size, join_lines, read_lines};
use crate::sync::types::{DeletionEntry, DeletionStats, SyncResult, Table, MANIFEST_FILE_NAME};

/// Handle on a `.deletions.jsonl` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionManifest {
    path: PathBuf,
}

impl DeletionManifest {
    /// Manifest inside an export directory.
    #[must_use]
    pub fn in_dir(export_dir: &Path) -> Self {
        Self {
            path: export_dir.join(MANIFEST_FILE_NAME),
        }
    }

    /// Manifest at an explicit path.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one deletion.
    ///
    /// # Errors
    ///
    /// Returns an error if the line cannot be appended.
    pub fn record(&self, entry: &DeletionEntry) -> SyncResult<()> {
        append_line(&self.path, &serde_json::to_string(entry)?)
    }

    /// Append several deletions in order.
    ///
    /// # Errors
    ///
    /// Returns an error on the first line that cannot be appended.
    pub fn record_all(&self, entries: &[DeletionEntry]) -> SyncResult<()> {
        for entry in entries {
            self.record(entry)?;
        }
        debug!(count = entries.len(), path = %self.path.display(), "Recorded deletions");
        Ok(())
    }

    /// Load all entries. A missing manifest is empty.
    ///
    /// Malformed lines are skipped with a warning; the second value counts them.
    ///
    /// # Errors
    ///
    /// Returns an error only if the file exists but cannot be read.
    pub fn load(&self) -> SyncResult<(Vec<DeletionEntry>, usize)> {
        if !self.path.exists() {
            return Ok((Vec::new(), 0));
        }

        let mut entries = Vec::new();
        let mut malformed = 0;
        for (line_num, line) in read_lines(&self.path)? {
            match serde_json::from_str::<DeletionEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(line = line_num, error = %e, "Skipping malformed deletion entry");
                    malformed += 1;
                }
            }
        }
        Ok((entries, malformed))
    }

    /// Number of well-formed entries currently recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn pending(&self) -> SyncResult<usize> {
        Ok(self.load()?.0.len())
    }

    /// Apply the manifest against a storage in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be read or the transaction fails.
    pub fn apply(&self, storage: &mut SqliteStorage) -> SyncResult<DeletionStats> {
        let (entries, malformed) = self.load()?;
        let mut stats = storage.mutate("apply_deletions", |tx, _ctx| {
            Ok(apply_entries(tx, &entries)?)
        })?;
        stats.malformed = malformed;
        Ok(stats)
    }

    /// Drop entries for rows that were written again locally.
    ///
    /// Ids such as file ids are derived from content keys, so a removed row
    /// can come back under the same id. Its old tombstone must not delete it
    /// on the next import. Lines that do not parse are kept as they are.
    /// Returns the number of entries dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be read or rewritten.
    pub fn forget(&self, rows: &[(Table, String)]) -> SyncResult<usize> {
        if rows.is_empty() || file_size(&self.path) == 0 {
            return Ok(0);
        }
        let written: HashSet<(&str, &str)> = rows
            .iter()
            .map(|(table, id)| (table.as_str(), id.as_str()))
            .collect();

        let mut kept = Vec::new();
        let mut dropped = 0;
        for (_, line) in read_lines(&self.path)? {
            if let Ok(entry) = serde_json::from_str::<DeletionEntry>(&line) {
                if written.contains(&(entry.table.as_str(), entry.id.as_str())) {
                    dropped += 1;
                    continue;
                }
            }
            kept.push(line);
        }

        if dropped > 0 {
            atomic_write(&self.path, &join_lines(&kept))?;
            info!(dropped, path = %self.path.display(), "Dropped deletions for re-created rows");
        }
        Ok(dropped)
    }

    /// Truncate the manifest to empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be rewritten.
    pub fn clear(&self) -> SyncResult<()> {
        if self.path.exists() {
            atomic_write(&self.path, "")?;
            info!(path = %self.path.display(), "Cleared deletion manifest");
        }
        Ok(())
    }
}

/// Apply entries inside an open transaction, one batched delete per table.
///
/// Children are deleted before parents so counts reflect the manifest rather
/// than cascades. Unknown tables are logged and skipped. Entries whose row is
/// already gone count as `already_absent`, so applying twice is a no-op.
///
/// # Errors
///
/// Returns an error if a delete statement fails.
pub fn apply_entries(
    tx: &Transaction<'_>,
    entries: &[DeletionEntry],
) -> rusqlite::Result<DeletionStats> {
    let mut stats = DeletionStats::default();
    let mut grouped: BTreeMap<Table, Vec<String>> = BTreeMap::new();

    for entry in entries {
        match entry.table.parse::<Table>() {
            Ok(table) => grouped.entry(table).or_default().push(entry.id.clone()),
            Err(_) => {
                warn!(table = %entry.table, id = %entry.id, "Skipping deletion for unknown table");
                stats.unknown_tables += 1;
            }
        }
    }

    let mut tables: Vec<_> = grouped.into_iter().collect();
    tables.sort_by_key(|(table, _)| std::cmp::Reverse(table.insert_rank()));

    for (table, mut ids) in tables {
        ids.sort();
        ids.dedup();
        let deleted = delete_ids(tx, table, &ids)?;
        debug!(table = %table, requested = ids.len(), deleted, "Applied deletions");
        stats.deleted += deleted;
        stats.already_absent += ids.len().saturating_sub(deleted);
    }

    Ok(stats)
}
