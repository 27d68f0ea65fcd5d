//! JSONL export functionality.
//!
//! This module mirrors database tables to `{table}.jsonl` files for git-based
//! sync.
//!
//! # Snapshot Mode
//!
//! Exports use **snapshot mode**: each JSONL file is the full current content
//! of its table, one row per line ordered by id. Git tracks the history.
//!
//! # Change Detection
//!
//! Each table dump is hashed and compared to the hash stored in
//! `export_state`. Unchanged tables are not rewritten and their state row is
//! left alone, so a repeated export of an idle database touches nothing.
//!
//! # Consistency
//!
//! All tables are dumped inside one read transaction before any file is
//! written, so a concurrent writer cannot leave a child file referencing a
//! parent row missing from the parent file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::model::now_millis;
use crate::storage::rows::dump_table;
use crate::storage::SqliteStorage;
use crate::sync::debounce::Debouncer;
use crate::sync::file::{atomic_write, ensure_gitattributes, ensure_gitignore, join_lines};
use crate::sync::hash::{content_hash_str, has_changed};
use crate::sync::manifest::DeletionManifest;
use crate::sync::state::{load_state, save_state, ExportState};
use crate::sync::types::{ExportStats, SyncResult, Table, TableExport};

/// Exporter for JSONL sync files.
pub struct Exporter<'a> {
    storage: &'a SqliteStorage,
    output_dir: PathBuf,
    tables: Vec<Table>,
    clear_manifest: bool,
}

impl<'a> Exporter<'a> {
    /// Create an exporter for all synced tables.
    #[must_use]
    pub fn new(storage: &'a SqliteStorage, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            output_dir: output_dir.into(),
            tables: Table::ALL.to_vec(),
            clear_manifest: false,
        }
    }

    /// Restrict the export to a subset of tables.
    #[must_use]
    pub fn with_tables(mut self, tables: &[Table]) -> Self {
        self.tables = tables.to_vec();
        self
    }

    /// Truncate the deletion manifest after a successful pass.
    ///
    /// Off by default: tombstones cleared before peers pulled them are lost.
    #[must_use]
    pub fn clear_manifest_after_export(mut self, clear: bool) -> Self {
        self.clear_manifest = clear;
        self
    }

    /// Get the output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Export every configured table.
    ///
    /// With `force`, change detection is bypassed and every file is rewritten.
    ///
    /// # Errors
    ///
    /// Returns an error if a dump, a file write or a state update fails.
    /// Tables exported before the failure keep their new files and state.
    pub fn export(&self, force: bool) -> SyncResult<ExportStats> {
        fs::create_dir_all(&self.output_dir)?;
        ensure_gitignore(&self.output_dir)?;
        ensure_gitattributes(&self.output_dir)?;

        let snapshot = dump_snapshot(self.storage.conn(), &self.tables)?;
        let mut stats = ExportStats::default();
        for (table, lines) in &snapshot {
            stats.tables.push(self.export_table(*table, lines, force)?);
        }

        if self.clear_manifest {
            DeletionManifest::in_dir(&self.output_dir).clear()?;
            stats.manifest_cleared = true;
        }

        info!(
            dir = %self.output_dir.display(),
            written = stats.written(),
            rows = stats.rows_written(),
            force,
            "Export complete"
        );
        Ok(stats)
    }

    fn export_table(&self, table: Table, lines: &[String], force: bool) -> SyncResult<TableExport> {
        let conn = self.storage.conn();
        let content = join_lines(lines);
        let hash = content_hash_str(&content);
        let path = self.output_dir.join(table.file_name());

        let stored = load_state(conn, table)?;
        let changed = has_changed(&hash, stored.as_ref().map(|s| s.content_hash.as_str()));

        if !force && !changed && path.exists() {
            debug!(table = %table, "Unchanged, skipping");
            return Ok(TableExport {
                table,
                rows: lines.len(),
                written: false,
                content_hash: hash,
            });
        }

        atomic_write(&path, &content)?;
        save_state(
            conn,
            &ExportState {
                table,
                content_hash: hash.clone(),
                row_count: lines.len(),
                exported_at: now_millis(),
            },
        )?;

        debug!(table = %table, rows = lines.len(), path = %path.display(), "Exported table");
        Ok(TableExport {
            table,
            rows: lines.len(),
            written: true,
            content_hash: hash,
        })
    }
}

/// Dump `tables` from a single read snapshot.
///
/// # Errors
///
/// Returns an error if the transaction or a dump fails.
pub(crate) fn dump_snapshot(
    conn: &Connection,
    tables: &[Table],
) -> SyncResult<Vec<(Table, Vec<String>)>> {
    dump_snapshot_with(conn, tables, |_| Ok(()))
}

fn dump_snapshot_with<F>(
    conn: &Connection,
    tables: &[Table],
    mut after_table: F,
) -> SyncResult<Vec<(Table, Vec<String>)>>
where
    F: FnMut(Table) -> SyncResult<()>,
{
    let tx = conn.unchecked_transaction()?;
    let mut dumps = Vec::with_capacity(tables.len());
    for table in tables {
        dumps.push((*table, dump_table(&tx, *table)?));
        after_table(*table)?;
    }
    tx.commit()?;
    Ok(dumps)
}

/// Debounced export trigger.
///
/// Write paths call [`ExportScheduler::request`]; the owner polls and runs a
/// single export pass once requests have stopped arriving for the window.
#[derive(Debug, Clone)]
pub struct ExportScheduler {
    debouncer: Debouncer,
}

impl ExportScheduler {
    /// Default quiet window before a requested export runs.
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5);

    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            debouncer: Debouncer::new(window),
        }
    }

    /// Note that data changed and an export is wanted.
    pub fn request(&mut self, now: Instant) {
        self.debouncer.trigger(now);
    }

    /// Whether an export is waiting for its window to pass.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.debouncer.is_idle()
    }

    /// When the pending export becomes due.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Run `export` if the pending pass is due at `now`.
    ///
    /// Returns `None` when nothing ran.
    ///
    /// # Errors
    ///
    /// Propagates the export error; the scheduler returns to idle either way.
    pub fn run_if_due<F>(&mut self, now: Instant, export: F) -> SyncResult<Option<ExportStats>>
    where
        F: FnOnce() -> SyncResult<ExportStats>,
    {
        if !self.debouncer.poll(now) {
            return Ok(None);
        }
        let result = export();
        self.debouncer.finish(now);
        result.map(Some)
    }

    /// Drop a pending request (a forced export supersedes it).
    pub fn cancel(&mut self) {
        self.debouncer.cancel();
    }
}

impl Default for ExportScheduler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IndexedFile, Repository, Symbol};
    use crate::sync::types::DeletionEntry;
    use tempfile::TempDir;

    fn seeded() -> SqliteStorage {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let repo = Repository::new("demo", None);
        storage.upsert_repository(&repo).unwrap();
        let file = IndexedFile::new(&repo.id, "src/a.ts", "export function a() {}");
        storage.upsert_files(std::slice::from_ref(&file)).unwrap();
        storage
            .upsert_symbols(&[Symbol::new(&file.id, "a", "function", 1, 1)])
            .unwrap();
        storage
    }

    fn mtime(path: &Path) -> std::time::SystemTime {
        fs::metadata(path).unwrap().modified().unwrap()
    }

    #[test]
    fn test_export_writes_one_file_per_table() {
        let temp_dir = TempDir::new().unwrap();
        let storage = seeded();

        let stats = Exporter::new(&storage, temp_dir.path()).export(false).unwrap();
        assert_eq!(stats.written(), Table::ALL.len());

        for table in Table::ALL {
            assert!(temp_dir.path().join(table.file_name()).exists(), "{table}");
        }
        let symbols = fs::read_to_string(temp_dir.path().join("symbols.jsonl")).unwrap();
        assert_eq!(symbols.lines().count(), 1);
        assert!(symbols.contains("\"name\":\"a\""));

        // Empty tables still get an (empty) file
        let jobs = fs::read_to_string(temp_dir.path().join("index_jobs.jsonl")).unwrap();
        assert!(jobs.is_empty());

        assert!(temp_dir.path().join(".gitignore").exists());
        assert!(temp_dir.path().join(".gitattributes").exists());
    }

    #[test]
    fn test_second_export_is_a_no_op() {
        let temp_dir = TempDir::new().unwrap();
        let storage = seeded();
        let exporter = Exporter::new(&storage, temp_dir.path());

        exporter.export(false).unwrap();
        let states_before: Vec<_> = Table::ALL
            .iter()
            .map(|t| load_state(storage.conn(), *t).unwrap())
            .collect();
        let symbols_path = temp_dir.path().join("symbols.jsonl");
        let mtime_before = mtime(&symbols_path);

        let stats = exporter.export(false).unwrap();
        assert!(stats.is_empty());

        let states_after: Vec<_> = Table::ALL
            .iter()
            .map(|t| load_state(storage.conn(), *t).unwrap())
            .collect();
        assert_eq!(states_before, states_after);
        assert_eq!(mtime_before, mtime(&symbols_path));
    }

    #[test]
    fn test_only_changed_tables_are_rewritten() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = seeded();
        Exporter::new(&storage, temp_dir.path()).export(false).unwrap();

        let repo = Repository::new("second", None);
        storage.upsert_repository(&repo).unwrap();

        let stats = Exporter::new(&storage, temp_dir.path()).export(false).unwrap();
        let written: Vec<_> = stats
            .tables
            .iter()
            .filter(|t| t.written)
            .map(|t| t.table)
            .collect();
        assert_eq!(written, vec![Table::Repositories]);
    }

    #[test]
    fn test_force_rewrites_everything() {
        let temp_dir = TempDir::new().unwrap();
        let storage = seeded();
        let exporter = Exporter::new(&storage, temp_dir.path());

        exporter.export(false).unwrap();
        let stats = exporter.export(true).unwrap();
        assert_eq!(stats.written(), Table::ALL.len());
    }

    #[test]
    fn test_missing_file_is_rewritten_even_if_state_matches() {
        let temp_dir = TempDir::new().unwrap();
        let storage = seeded();
        let exporter = Exporter::new(&storage, temp_dir.path());

        exporter.export(false).unwrap();
        fs::remove_file(temp_dir.path().join("symbols.jsonl")).unwrap();

        let stats = exporter.export(false).unwrap();
        assert_eq!(stats.written(), 1);
        assert!(temp_dir.path().join("symbols.jsonl").exists());
    }

    #[test]
    fn test_manifest_kept_unless_clearing_enabled() {
        let temp_dir = TempDir::new().unwrap();
        let storage = seeded();
        let manifest = DeletionManifest::in_dir(temp_dir.path());
        manifest.record(&DeletionEntry::now(Table::Symbols, "gone")).unwrap();

        let stats = Exporter::new(&storage, temp_dir.path()).export(false).unwrap();
        assert!(!stats.manifest_cleared);
        assert_eq!(manifest.pending().unwrap(), 1);

        let stats = Exporter::new(&storage, temp_dir.path())
            .clear_manifest_after_export(true)
            .export(false)
            .unwrap();
        assert!(stats.manifest_cleared);
        assert_eq!(manifest.pending().unwrap(), 0);
    }

    #[test]
    fn test_snapshot_ignores_writes_between_tables() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("kota.db");
        let mut exporting = SqliteStorage::open(&db).unwrap();
        let mut writer = SqliteStorage::open(&db).unwrap();

        let repo = Repository::new("demo", None);
        exporting.upsert_repository(&repo).unwrap();
        exporting
            .upsert_files(&[IndexedFile::new(&repo.id, "src/a.ts", "a")])
            .unwrap();

        let tables = [Table::Repositories, Table::IndexedFiles];
        let snapshot = dump_snapshot_with(exporting.conn(), &tables, |table| {
            if table == Table::Repositories {
                writer
                    .upsert_files(&[IndexedFile::new(&repo.id, "src/b.ts", "b")])
                    .unwrap();
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(snapshot[0].1.len(), 1);
        assert_eq!(snapshot[1].1.len(), 1, "file written mid-export leaked into the dump");
        assert_eq!(dump_table(exporting.conn(), Table::IndexedFiles).unwrap().len(), 2);
    }

    #[test]
    fn test_scheduler_collapses_requests() {
        let t0 = Instant::now();
        let mut scheduler = ExportScheduler::default();
        let mut runs = 0;

        for i in 0..20 {
            scheduler.request(t0 + Duration::from_millis(i * 100));
        }
        let last = t0 + Duration::from_millis(1900);

        let ran = scheduler
            .run_if_due(last + Duration::from_secs(4), || {
                runs += 1;
                Ok(ExportStats::default())
            })
            .unwrap();
        assert!(ran.is_none());

        let ran = scheduler
            .run_if_due(last + ExportScheduler::DEFAULT_WINDOW, || {
                runs += 1;
                Ok(ExportStats::default())
            })
            .unwrap();
        assert!(ran.is_some());
        assert_eq!(runs, 1);
        assert!(!scheduler.is_pending());
    }
}
