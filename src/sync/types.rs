//! Sync types for JSONL export/import.
//!
//! Tables, deletion entries, per-pass statistics and the sync error type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A table mirrored to `{table}.jsonl` during sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Repositories,
    IndexedFiles,
    Symbols,
    SymbolReferences,
    Dependencies,
    IndexJobs,
}

impl Table {
    /// All synced tables, parents before children.
    pub const ALL: [Self; 6] = [
        Self::Repositories,
        Self::IndexedFiles,
        Self::Symbols,
        Self::SymbolReferences,
        Self::Dependencies,
        Self::IndexJobs,
    ];

    /// SQL table name (also the JSONL file stem).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Repositories => "repositories",
            Self::IndexedFiles => "indexed_files",
            Self::Symbols => "symbols",
            Self::SymbolReferences => "symbol_references",
            Self::Dependencies => "dependencies",
            Self::IndexJobs => "index_jobs",
        }
    }

    /// Position in insert order; parents sort first.
    #[must_use]
    pub fn insert_rank(&self) -> usize {
        Self::ALL.iter().position(|t| t == self).unwrap_or(usize::MAX)
    }

    /// Export file name, e.g. `symbols.jsonl`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.{JSONL_EXTENSION}", self.as_str())
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown table: {s}"))
    }
}

/// Extension of every tracked sync file.
pub const JSONL_EXTENSION: &str = "jsonl";

/// Reserved name of the deletion manifest inside the export directory.
pub const MANIFEST_FILE_NAME: &str = ".deletions.jsonl";

/// One line of the deletion manifest.
///
/// `table` stays a plain string so entries written by a newer peer with
/// tables we do not know are still readable (and skipped on apply).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionEntry {
    pub table: String,
    pub id: String,
    /// RFC 3339 timestamp of the delete.
    pub deleted_at: String,
}

impl DeletionEntry {
    /// Entry stamped with the current time.
    #[must_use]
    pub fn now(table: Table, id: &str) -> Self {
        Self {
            table: table.as_str().to_string(),
            id: id.to_string(),
            deleted_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Outcome of exporting one table.
#[derive(Debug, Clone, Serialize)]
pub struct TableExport {
    pub table: Table,
    /// Rows in the table at export time.
    pub rows: usize,
    /// False when change detection skipped the write.
    pub written: bool,
    pub content_hash: String,
}

/// Statistics for an export pass.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ExportStats {
    pub tables: Vec<TableExport>,
    /// Whether the deletion manifest was cleared after this pass.
    pub manifest_cleared: bool,
}

impl ExportStats {
    /// Number of table files actually rewritten.
    #[must_use]
    pub fn written(&self) -> usize {
        self.tables.iter().filter(|t| t.written).count()
    }

    /// Total rows across written tables.
    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.tables.iter().filter(|t| t.written).map(|t| t.rows).sum()
    }

    /// Returns true if no file was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.written() == 0
    }
}

/// Per-table statistics for an import pass.
#[derive(Debug, Default, Clone, Serialize)]
pub struct TableImportStats {
    /// Rows upserted.
    pub imported: usize,
    /// Lines skipped (malformed JSON, missing id, constraint failures).
    pub skipped: usize,
    /// Human-readable reasons for each skip.
    pub diagnostics: Vec<String>,
}

impl TableImportStats {
    pub(crate) fn skip(&mut self, reason: String) {
        self.skipped += 1;
        self.diagnostics.push(reason);
    }
}

/// Statistics for applying a deletion manifest.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionStats {
    /// Rows actually removed.
    pub deleted: usize,
    /// Entries whose row was already gone.
    pub already_absent: usize,
    /// Entries naming a table we do not sync.
    pub unknown_tables: usize,
    /// Manifest lines that did not parse.
    pub malformed: usize,
}

/// Statistics for an import pass.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportStats {
    pub tables: BTreeMap<Table, TableImportStats>,
    pub deletions: DeletionStats,
}

impl ImportStats {
    /// Total rows upserted across tables.
    #[must_use]
    pub fn total_imported(&self) -> usize {
        self.tables.values().map(|t| t.imported).sum()
    }

    /// Total lines skipped across tables.
    #[must_use]
    pub fn total_skipped(&self) -> usize {
        self.tables.values().map(|t| t.skipped).sum()
    }
}

/// Sync status for one table.
#[derive(Debug, Clone, Serialize)]
pub struct TableStatus {
    pub table: Table,
    pub db_rows: usize,
    pub file_lines: usize,
    pub file_size: u64,
    pub last_hash: Option<String>,
    /// Unix milliseconds of the last export that wrote this table.
    pub last_exported_at: Option<i64>,
    /// Database content differs from the last export (or was never exported).
    pub changed: bool,
}

/// Sync status information.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub export_dir: String,
    pub tables: Vec<TableStatus>,
    /// Entries currently in the deletion manifest.
    pub pending_deletions: usize,
}

/// Sync-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// The export directory does not exist.
    #[error("Export directory does not exist: {0}")]
    ExportDirMissing(String),

    /// JSONL file not found.
    #[error("JSONL file not found: {0}")]
    FileNotFound(String),

    /// The filesystem watcher could not be set up.
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// A merge driver input could not be read.
    #[error("Cannot read merge input {path}: {source}")]
    MergeInput {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl SyncStatus {
    /// Tables whose next export would write.
    #[must_use]
    pub fn changed_tables(&self) -> usize {
        self.tables.iter().filter(|t| t.changed).count()
    }
}

impl From<crate::error::Error> for SyncError {
    fn from(err: crate::error::Error) -> Self {
        match err {
            crate::error::Error::Io(e) => Self::Io(e),
            crate::error::Error::Json(e) => Self::Json(e),
            crate::error::Error::Sync(e) => e,
            other => Self::Database(other.to_string()),
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_parents_first() {
        assert!(Table::Repositories.insert_rank() < Table::IndexedFiles.insert_rank());
        assert!(Table::IndexedFiles.insert_rank() < Table::Symbols.insert_rank());
        assert!(Table::Symbols.insert_rank() < Table::SymbolReferences.insert_rank());
        assert!(Table::IndexedFiles.insert_rank() < Table::Dependencies.insert_rank());
    }

    #[test]
    fn test_table_parse_and_file_name() {
        assert_eq!("symbols".parse::<Table>().unwrap(), Table::Symbols);
        assert!("sessions".parse::<Table>().is_err());
        assert_eq!(Table::SymbolReferences.file_name(), "symbol_references.jsonl");
    }

    #[test]
    fn test_export_stats() {
        let mut stats = ExportStats::default();
        assert!(stats.is_empty());

        stats.tables.push(TableExport {
            table: Table::Symbols,
            rows: 3,
            written: true,
            content_hash: "h".into(),
        });
        stats.tables.push(TableExport {
            table: Table::Dependencies,
            rows: 7,
            written: false,
            content_hash: "h".into(),
        });
        assert_eq!(stats.written(), 1);
        assert_eq!(stats.rows_written(), 3);
        assert!(!stats.is_empty());
    }

    #[test]
    fn test_deletion_entry_wire_format() {
        let entry = DeletionEntry {
            table: "symbols".into(),
            id: "s1".into(),
            deleted_at: "2025-01-20T00:00:00+00:00".into(),
        };
        let line = serde_json::to_string(&entry).unwrap();
        assert_eq!(
            line,
            r#"{"table":"symbols","id":"s1","deleted_at":"2025-01-20T00:00:00+00:00"}"#
        );
    }
}
