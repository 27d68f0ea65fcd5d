//! Per-project store context.
//!
//! A [`Store`] owns one database, its export directory, the sync config, the
//! debounced export scheduler and the sync watcher. Nothing here is global:
//! two stores for two projects can live in one process.
//!
//! Writes request a debounced export; the owner drives time forward with
//! [`Store::poll`], which runs a due export and a due watcher import.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::Result;
use crate::model::{DependencyNode, FileSearchResult, IndexedFile};
use crate::storage::{SqliteStorage, WriteBatch};
use crate::sync::{
    get_sync_status, DeletionManifest, ExportScheduler, ExportStats, Exporter, ImportStats,
    Importer, SyncStatus, SyncWatcher, Table,
};

/// What one [`Store::poll`] call did.
#[derive(Debug, Default)]
pub struct PollOutcome {
    /// Stats of the debounced export, if one ran.
    pub exported: Option<ExportStats>,
    /// Stats of the watcher-triggered import, if one ran and succeeded.
    pub imported: Option<ImportStats>,
}

impl PollOutcome {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.exported.is_none() && self.imported.is_none()
    }
}

/// Storage plus sync machinery for one project.
#[derive(Debug)]
pub struct Store {
    storage: SqliteStorage,
    config: SyncConfig,
    export_dir: PathBuf,
    scheduler: ExportScheduler,
    watcher: SyncWatcher,
}

impl Store {
    /// Open the database at `db_path` and attach the export directory's
    /// deletion manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(db_path: &Path, export_dir: impl Into<PathBuf>, config: SyncConfig) -> Result<Self> {
        let storage = SqliteStorage::open(db_path)?;
        Ok(Self::with_storage(storage, export_dir, config))
    }

    /// Wrap an already-open storage (e.g. in-memory for tests).
    #[must_use]
    pub fn with_storage(
        storage: SqliteStorage,
        export_dir: impl Into<PathBuf>,
        config: SyncConfig,
    ) -> Self {
        let export_dir = export_dir.into();
        let storage = storage.with_manifest(DeletionManifest::in_dir(&export_dir));
        let scheduler = ExportScheduler::new(config.export_window());
        let watcher = SyncWatcher::new(&export_dir, config.import_window()).with_tables(&config.tables);
        Self {
            storage,
            config,
            export_dir,
            scheduler,
            watcher,
        }
    }

    #[must_use]
    pub const fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Mutable storage access. Writes made this way do not request an export.
    pub fn storage_mut(&mut self) -> &mut SqliteStorage {
        &mut self.storage
    }

    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    #[must_use]
    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    // ======================
    // Queries
    // ======================

    /// Full-text search over file content.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn search(&self, term: &str, limit: u32) -> Result<Vec<FileSearchResult>> {
        self.storage.search(term, limit)
    }

    /// Most recently indexed files, optionally for one repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_recent(&self, limit: u32, repository_id: Option<&str>) -> Result<Vec<IndexedFile>> {
        self.storage.list_recent(limit, repository_id)
    }

    /// Files that (transitively) depend on `file_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn dependents(&self, file_id: &str, max_depth: Option<u32>) -> Result<Vec<DependencyNode>> {
        self.storage.dependents(file_id, max_depth)
    }

    /// Files that `file_id` (transitively) depends on.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn dependencies(&self, file_id: &str, max_depth: Option<u32>) -> Result<Vec<DependencyNode>> {
        self.storage.dependencies(file_id, max_depth)
    }

    /// Exact repository + path lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn resolve_path(&self, repository_id: &str, path: &str) -> Result<Option<String>> {
        self.storage.resolve_path(repository_id, path)
    }

    // ======================
    // Writes
    // ======================

    /// Write one batch atomically and schedule an export.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch fails; nothing is written or scheduled.
    pub fn batch_write(&mut self, batch: &WriteBatch) -> Result<usize> {
        self.batch_write_at(batch, Instant::now())
    }

    /// [`Store::batch_write`] with an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch fails; nothing is written or scheduled.
    pub fn batch_write_at(&mut self, batch: &WriteBatch, now: Instant) -> Result<usize> {
        let written = self.storage.batch_write(batch)?;
        if written > 0 {
            self.scheduler.request(now);
        }
        Ok(written)
    }

    /// Delete a row, tombstone it and schedule an export.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete or the manifest append fails.
    pub fn remove(&mut self, table: Table, id: &str) -> Result<bool> {
        let removed = self.storage.remove(table, id)?;
        if removed {
            self.scheduler.request(Instant::now());
        }
        Ok(removed)
    }

    // ======================
    // Sync
    // ======================

    fn exporter(&self) -> Exporter<'_> {
        Exporter::new(&self.storage, &self.export_dir)
            .with_tables(&self.config.tables)
            .clear_manifest_after_export(self.config.clear_manifest_after_export)
    }

    /// Export now. A forced export rewrites every table and supersedes any
    /// pending debounced export; an unforced one still skips unchanged tables.
    ///
    /// # Errors
    ///
    /// Returns an error if a table cannot be dumped or written.
    pub fn export_now(&mut self, force: bool) -> Result<ExportStats> {
        self.scheduler.cancel();
        Ok(self.exporter().export(force)?)
    }

    /// Import from `dir` (default: the export directory).
    ///
    /// # Errors
    ///
    /// Returns `ExportDirMissing` if the directory does not exist, or a
    /// database error if the import transaction fails.
    pub fn import_now(&mut self, dir: Option<&Path>) -> Result<ImportStats> {
        let dir = dir.map_or_else(|| self.export_dir.clone(), Path::to_path_buf);
        let stats = Importer::new(&mut self.storage)
            .with_tables(&self.config.tables)
            .import_dir(&dir)?;
        Ok(stats)
    }

    /// Note a change made outside [`Store::batch_write`] (e.g. through
    /// [`Store::storage_mut`]) so it gets exported.
    pub fn request_export(&mut self, now: Instant) {
        self.scheduler.request(now);
    }

    /// Whether a debounced export is waiting.
    #[must_use]
    pub fn export_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    /// Earliest instant at which [`Store::poll`] has work to do.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.scheduler.deadline(), self.watcher.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Run whatever is due at `now`: first the debounced export, then the
    /// watcher's import.
    ///
    /// Watcher import failures are logged and leave the watcher armed.
    ///
    /// # Errors
    ///
    /// Returns the export error if the due export fails.
    pub fn poll(&mut self, now: Instant) -> Result<PollOutcome> {
        let mut outcome = PollOutcome::default();

        let exporter = Exporter::new(&self.storage, &self.export_dir)
            .with_tables(&self.config.tables)
            .clear_manifest_after_export(self.config.clear_manifest_after_export);
        outcome.exported = self.scheduler.run_if_due(now, || exporter.export(false))?;

        if let Some(Ok(stats)) = self.watcher.poll(now, &mut self.storage) {
            outcome.imported = Some(stats);
        }
        Ok(outcome)
    }

    /// Start the filesystem watcher on the export directory. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `ExportDirMissing` if the directory does not exist.
    pub fn start_watching(&mut self) -> Result<()> {
        Ok(self.watcher.start()?)
    }

    /// Stop the watcher and cancel any pending import. Idempotent.
    pub fn stop_watching(&mut self) {
        self.watcher.stop();
    }

    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.watcher.is_running()
    }

    /// Watcher access, e.g. to feed events in tests.
    pub fn watcher_mut(&mut self) -> &mut SyncWatcher {
        &mut self.watcher
    }

    /// Watch and export until `should_stop` returns true.
    ///
    /// A pending export is flushed before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher cannot start or the final export fails.
    pub fn watch<F>(&mut self, tick: Duration, mut should_stop: F) -> Result<()>
    where
        F: FnMut() -> bool,
    {
        self.start_watching()?;
        while !should_stop() {
            let wait = self
                .next_deadline()
                .map_or(tick, |d| d.saturating_duration_since(Instant::now()).min(tick));
            std::thread::sleep(wait);

            match self.poll(Instant::now()) {
                Ok(outcome) if !outcome.is_empty() => debug!(?outcome, "Sync tick"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Debounced export failed"),
            }
        }
        self.stop_watching();

        if self.scheduler.is_pending() {
            self.export_now(false)?;
        }
        Ok(())
    }

    /// Confirm the current manifest has reached every peer and clear it.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be truncated.
    pub fn acknowledge_synced(&self) -> Result<usize> {
        let manifest = DeletionManifest::in_dir(&self.export_dir);
        let pending = manifest.pending()?;
        manifest.clear()?;
        info!(entries = pending, "Deletion manifest acknowledged");
        Ok(pending)
    }

    /// Per-table sync status.
    ///
    /// # Errors
    ///
    /// Returns an error if a table cannot be read.
    pub fn status(&self) -> Result<SyncStatus> {
        Ok(get_sync_status(&self.storage, &self.export_dir, &self.config.tables)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Dependency, Repository};
    use crate::sync::MANIFEST_FILE_NAME;
    use tempfile::TempDir;

    fn store(dir: &Path) -> Store {
        Store::with_storage(
            SqliteStorage::open_memory().unwrap(),
            dir,
            SyncConfig::default(),
        )
    }

    fn seed(store: &mut Store, now: Instant) -> (Repository, Vec<IndexedFile>) {
        let repo = Repository::new("api", None);
        store
            .batch_write_at(&WriteBatch::Repositories(vec![repo.clone()]), now)
            .unwrap();
        let files = vec![
            IndexedFile::new(&repo.id, "src/a.ts", "import './b'"),
            IndexedFile::new(&repo.id, "src/b.ts", "export const b = 1"),
        ];
        store
            .batch_write_at(&WriteBatch::Files(files.clone()), now)
            .unwrap();
        (repo, files)
    }

    #[test]
    fn test_writes_collapse_into_one_debounced_export() {
        let dir = TempDir::new().unwrap();
        let mut store = store(dir.path());
        let t0 = Instant::now();

        seed(&mut store, t0);
        assert!(store.export_pending());
        assert!(store.poll(t0 + Duration::from_secs(4)).unwrap().exported.is_none());

        let outcome = store.poll(t0 + Duration::from_secs(5)).unwrap();
        let stats = outcome.exported.unwrap();
        assert_eq!(stats.written(), Table::ALL.len());
        assert!(!store.export_pending());
        assert!(dir.path().join("indexed_files.jsonl").exists());

        assert!(store.poll(t0 + Duration::from_secs(20)).unwrap().is_empty());
    }

    #[test]
    fn test_forced_export_cancels_pending() {
        let dir = TempDir::new().unwrap();
        let mut store = store(dir.path());
        let t0 = Instant::now();
        seed(&mut store, t0);

        let first = store.export_now(false).unwrap();
        assert!(!store.export_pending());
        assert_eq!(first.written(), Table::ALL.len());

        let second = store.export_now(false).unwrap();
        assert_eq!(second.written(), 0);

        let forced = store.export_now(true).unwrap();
        assert_eq!(forced.written(), Table::ALL.len());
    }

    #[test]
    fn test_queries_delegate() {
        let dir = TempDir::new().unwrap();
        let mut store = store(dir.path());
        let (repo, files) = seed(&mut store, Instant::now());
        store
            .batch_write(&WriteBatch::Dependencies(vec![Dependency::new(
                &files[0].id,
                &files[1].id,
                "file_import",
            )]))
            .unwrap();

        assert_eq!(store.list_recent(10, Some(&repo.id)).unwrap().len(), 2);
        assert_eq!(store.search("export", 10).unwrap().len(), 1);
        assert_eq!(store.dependents(&files[1].id, None).unwrap().len(), 1);
        assert_eq!(store.dependencies(&files[0].id, Some(1)).unwrap()[0].path, "src/b.ts");
        assert_eq!(
            store.resolve_path(&repo.id, "src/a.ts").unwrap(),
            Some(files[0].id.clone())
        );
    }

    #[test]
    fn test_remove_propagates_to_peer_until_acknowledged() {
        let shared = TempDir::new().unwrap();
        let mut alice = store(shared.path());
        let (_, files) = seed(&mut alice, Instant::now());
        alice.export_now(false).unwrap();

        let mut bob = store(shared.path());
        bob.import_now(None).unwrap();
        assert!(bob.storage().get_file(&files[0].id).unwrap().is_some());

        assert!(alice.remove(Table::IndexedFiles, &files[0].id).unwrap());
        alice.export_now(false).unwrap();
        assert_eq!(alice.status().unwrap().pending_deletions, 1);

        bob.import_now(None).unwrap();
        assert!(bob.storage().get_file(&files[0].id).unwrap().is_none());
        assert!(bob.storage().get_file(&files[1].id).unwrap().is_some());

        assert_eq!(alice.acknowledge_synced().unwrap(), 1);
        assert_eq!(alice.status().unwrap().pending_deletions, 0);
        assert!(shared.path().join(MANIFEST_FILE_NAME).exists());
    }

    #[test]
    fn test_import_from_other_dir() {
        let source = TempDir::new().unwrap();
        let mut origin = store(source.path());
        seed(&mut origin, Instant::now());
        origin.export_now(false).unwrap();

        let target = TempDir::new().unwrap();
        let mut other = store(target.path());
        let stats = other.import_now(Some(source.path())).unwrap();
        assert_eq!(stats.total_imported(), 3);
        assert_eq!(other.list_recent(10, None).unwrap().len(), 2);
    }

    #[test]
    fn test_watcher_import_through_poll() {
        let shared = TempDir::new().unwrap();
        let mut origin = store(shared.path());
        seed(&mut origin, Instant::now());
        origin.export_now(false).unwrap();

        let mut follower = store(shared.path());
        follower.watcher_mut().start_detached().unwrap();
        let t0 = Instant::now();
        follower
            .watcher_mut()
            .handle_path(&shared.path().join("indexed_files.jsonl"), t0);

        assert!(follower.poll(t0).unwrap().imported.is_none());
        let outcome = follower.poll(t0 + Duration::from_secs(1)).unwrap();
        assert_eq!(outcome.imported.unwrap().total_imported(), 3);
        assert!(outcome.exported.is_none());

        follower.stop_watching();
        assert!(!follower.is_watching());
    }

    #[test]
    fn test_own_export_does_not_reimport_over_newer_write() {
        let dir = TempDir::new().unwrap();
        let mut store = store(dir.path());
        store.start_watching().unwrap();

        let t0 = Instant::now();
        let mut repo = Repository::new("api", None);
        repo.default_branch = Some("v1".into());
        store
            .batch_write_at(&WriteBatch::Repositories(vec![repo.clone()]), t0)
            .unwrap();
        let exported = store.poll(t0 + Duration::from_secs(5)).unwrap().exported;
        assert!(exported.is_some());

        // Wait for the OS to report our own file writes
        let echo_at = t0 + Duration::from_millis(5500);
        for _ in 0..100 {
            store.poll(echo_at).unwrap();
            if store.watcher_mut().is_pending() {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(store.watcher_mut().is_pending(), "no event for the exported files");

        repo.default_branch = Some("v2".into());
        store
            .batch_write_at(&WriteBatch::Repositories(vec![repo.clone()]), echo_at)
            .unwrap();

        let outcome = store.poll(echo_at + Duration::from_secs(1)).unwrap();
        assert!(outcome.imported.is_none());
        let branch = store.storage().get_repository(&repo.id).unwrap().unwrap().default_branch;
        assert_eq!(branch.as_deref(), Some("v2"));

        let outcome = store.poll(echo_at + Duration::from_secs(5)).unwrap();
        assert!(outcome.exported.is_some());
        assert!(outcome.imported.is_none());
        let content = std::fs::read_to_string(dir.path().join("repositories.jsonl")).unwrap();
        assert!(content.contains("\"default_branch\":\"v2\""), "{content}");

        store.stop_watching();
    }

    #[test]
    fn test_readded_file_survives_import() {
        let dir = TempDir::new().unwrap();
        let mut store = store(dir.path());
        let (_, files) = seed(&mut store, Instant::now());
        store.export_now(false).unwrap();

        assert!(store.remove(Table::IndexedFiles, &files[0].id).unwrap());
        store.export_now(false).unwrap();
        assert_eq!(store.status().unwrap().pending_deletions, 1);

        // Re-indexing the same path yields the same id
        let again = IndexedFile::new(&files[0].repository_id, &files[0].path, "import './c'");
        assert_eq!(again.id, files[0].id);
        store.batch_write(&WriteBatch::Files(vec![again])).unwrap();
        assert_eq!(store.status().unwrap().pending_deletions, 0);

        store.import_now(None).unwrap();
        assert!(store.storage().get_file(&files[0].id).unwrap().is_some());
    }

    #[test]
    fn test_start_watching_requires_dir() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir.path().join("missing"));
        assert!(store.start_watching().is_err());
        assert!(!store.is_watching());
    }

    #[test]
    fn test_watch_flushes_pending_export_on_stop() {
        let dir = TempDir::new().unwrap();
        let mut store = store(dir.path());
        seed(&mut store, Instant::now());

        let mut ticks = 0;
        store
            .watch(Duration::from_millis(1), || {
                ticks += 1;
                ticks > 2
            })
            .unwrap();

        assert!(!store.is_watching());
        assert!(!store.export_pending());
        assert!(dir.path().join("repositories.jsonl").exists());
    }
}
