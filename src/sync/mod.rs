//! JSONL sync operations.
//!
//! This module provides git-friendly synchronization via JSONL files:
//!
//! - **Export**: tables → `{table}.jsonl` snapshots, skipped when unchanged
//! - **Import**: JSONL files → SQLite, parents first, in one transaction
//! - **Deletion manifest**: `.deletions.jsonl` tombstones applied before import
//! - **Watcher**: debounced re-import when files change (e.g. after `git pull`)
//! - **Merge driver**: row-level three-way merge invoked by git
//! - **Status**: per-table row counts, export fingerprints and file stats
//!
//! # File Format
//!
//! One JSON object per line, keys named exactly like the table's columns and
//! sorted, rows ordered by `id`:
//! ```json
//! {"created_at":1737367200000,"default_branch":"main","id":"5f0c…","name":"api","path":null,"updated_at":1737367200000}
//! ```
//!
//! # Example
//!
//! ```ignore
//! use kota::sync::{Exporter, Importer};
//!
//! let stats = Exporter::new(&storage, &export_dir).export(false)?;
//! let stats = Importer::new(&mut storage).import_dir(&export_dir)?;
//! ```

mod debounce;
mod export;
mod file;
mod hash;
mod import;
mod manifest;
mod merge;
mod state;
mod status;
mod types;
mod watcher;

// Re-export main types and functions
pub use debounce::{DebounceState, Debouncer};
pub use export::{ExportScheduler, Exporter};
pub use file::{
    atomic_write, count_lines, ensure_gitattributes, ensure_gitignore, file_size,
    gitattributes_content, gitignore_content, is_tracked_table_file, merge_driver_git_config,
    read_lines, MERGE_DRIVER_NAME,
};
pub use hash::{content_hash_str, has_changed};
pub use import::Importer;
pub use manifest::{apply_entries, DeletionManifest};
pub use merge::{merge_files, merge_jsonl, MergeOutcome};
pub use state::{load_state, reset_state, save_state, ExportState};
pub use status::{get_sync_status, print_status};
pub use types::{
    DeletionEntry, DeletionStats, ExportStats, ImportStats, SyncError, SyncResult, SyncStatus,
    Table, TableExport, TableImportStats, TableStatus, JSONL_EXTENSION, MANIFEST_FILE_NAME,
};
pub use watcher::{SyncWatcher, DEFAULT_IMPORT_DEBOUNCE};
