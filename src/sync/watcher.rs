//! Sync watcher: re-import when exported files change on disk.
//!
//! A `notify` watcher feeds filesystem events into a channel. Events for
//! table files (`*.jsonl`, excluding the deletion manifest) arm a debouncer;
//! once the directory has been quiet for the window, one import pass runs.
//! Events caused by our own export are recognised by comparing the files
//! with the recorded export hashes, and do not trigger an import.
//! The watcher is driven by [`SyncWatcher::poll`] with an explicit `Instant`,
//! so tests can advance a virtual clock instead of sleeping.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::{Duration, Instant};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tracing::{debug, info, warn};

use crate::storage::SqliteStorage;
use crate::sync::debounce::Debouncer;
use crate::sync::file::is_tracked_table_file;
use crate::sync::hash::content_hash_str;
use crate::sync::import::Importer;
use crate::sync::state::load_state;
use crate::sync::types::{ImportStats, SyncError, SyncResult, Table};

/// Default quiet window before an import runs.
pub const DEFAULT_IMPORT_DEBOUNCE: Duration = Duration::from_secs(1);

/// Live `notify` handle plus its event channel.
struct Subscription {
    _watcher: RecommendedWatcher,
    events: Receiver<notify::Result<Event>>,
}

/// Filesystem watcher over an export directory.
pub struct SyncWatcher {
    export_dir: PathBuf,
    tables: Vec<Table>,
    debouncer: Debouncer,
    subscription: Option<Subscription>,
    /// Accept events without an OS watcher (virtual-clock tests).
    armed: bool,
}

impl std::fmt::Debug for SyncWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncWatcher")
            .field("export_dir", &self.export_dir)
            .field("debouncer", &self.debouncer)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl SyncWatcher {
    #[must_use]
    pub fn new(export_dir: impl Into<PathBuf>, window: Duration) -> Self {
        Self {
            export_dir: export_dir.into(),
            tables: Table::ALL.to_vec(),
            debouncer: Debouncer::new(window),
            subscription: None,
            armed: false,
        }
    }

    /// Restrict re-imports to a subset of tables.
    #[must_use]
    pub fn with_tables(mut self, tables: &[Table]) -> Self {
        self.tables = tables.to_vec();
        self
    }

    #[must_use]
    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.armed
    }

    /// Whether an import is scheduled or running.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.debouncer.is_idle()
    }

    /// When the scheduled import becomes due.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Start watching the export directory. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ExportDirMissing` if the directory does not exist, or a watch
    /// error if the OS watcher cannot be created.
    pub fn start(&mut self) -> SyncResult<()> {
        if self.subscription.is_some() {
            return Ok(());
        }
        self.ensure_dir()?;

        let (tx, rx) = channel();
        let mut watcher = RecommendedWatcher::new(tx, Config::default())?;
        watcher.watch(&self.export_dir, RecursiveMode::NonRecursive)?;

        self.subscription = Some(Subscription {
            _watcher: watcher,
            events: rx,
        });
        self.armed = true;
        info!(dir = %self.export_dir.display(), "Watching export directory");
        Ok(())
    }

    /// Arm the state machine without an OS watcher; events arrive only via
    /// [`SyncWatcher::handle_event`] / [`SyncWatcher::handle_path`].
    ///
    /// # Errors
    ///
    /// Returns `ExportDirMissing` if the directory does not exist.
    pub fn start_detached(&mut self) -> SyncResult<()> {
        self.ensure_dir()?;
        self.armed = true;
        Ok(())
    }

    fn ensure_dir(&self) -> SyncResult<()> {
        if self.export_dir.is_dir() {
            Ok(())
        } else {
            Err(SyncError::ExportDirMissing(
                self.export_dir.display().to_string(),
            ))
        }
    }

    /// Stop watching and cancel any pending import. Idempotent.
    pub fn stop(&mut self) {
        if self.armed {
            info!(dir = %self.export_dir.display(), "Stopped watching");
        }
        self.subscription = None;
        self.debouncer.cancel();
        self.armed = false;
    }

    /// Feed one path change. Returns true if it scheduled an import.
    pub fn handle_path(&mut self, path: &Path, now: Instant) -> bool {
        if !self.armed || !is_tracked_table_file(path) {
            return false;
        }
        debug!(path = %path.display(), "Export file changed");
        self.debouncer.trigger(now);
        true
    }

    /// Feed one `notify` event. Only creations and modifications count.
    pub fn handle_event(&mut self, event: &Event, now: Instant) -> bool {
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            return false;
        }
        let mut scheduled = false;
        for path in &event.paths {
            scheduled |= self.handle_path(path, now);
        }
        scheduled
    }

    /// Move queued OS events into the debouncer.
    fn drain(&mut self, now: Instant) {
        let mut events = Vec::new();
        if let Some(sub) = &self.subscription {
            while let Ok(res) = sub.events.try_recv() {
                events.push(res);
            }
        }
        for res in events {
            match res {
                Ok(event) => {
                    self.handle_event(&event, now);
                }
                Err(e) => warn!(error = %e, "Watch error"),
            }
        }
    }

    /// Whether every table file on disk is exactly what this database last
    /// exported. Re-importing those would overwrite newer local writes with
    /// the older exported rows.
    fn is_own_export(&self, storage: &SqliteStorage) -> bool {
        if !self.export_dir.is_dir() {
            return false;
        }
        let mut seen = false;
        for table in &self.tables {
            let path = self.export_dir.join(table.file_name());
            if !path.exists() {
                continue;
            }
            let Ok(content) = fs::read_to_string(&path) else {
                return false;
            };
            match load_state(storage.conn(), *table) {
                Ok(Some(state)) if state.content_hash == content_hash_str(&content) => seen = true,
                _ => return false,
            }
        }
        seen
    }

    /// Advance the state machine to `now`, running the import if it is due.
    ///
    /// Returns `None` if no import ran. A failed import is logged and
    /// returned, and the watcher stays armed for the next change.
    pub fn poll(&mut self, now: Instant, storage: &mut SqliteStorage) -> Option<SyncResult<ImportStats>> {
        if !self.armed {
            return None;
        }
        self.drain(now);
        if !self.debouncer.poll(now) {
            return None;
        }
        if self.is_own_export(storage) {
            debug!(dir = %self.export_dir.display(), "Files match the last export, skipping import");
            self.debouncer.finish(now);
            return None;
        }

        let result = Importer::new(storage)
            .with_tables(&self.tables)
            .import_dir(&self.export_dir);
        if let Err(e) = &result {
            warn!(dir = %self.export_dir.display(), error = %e, "Watcher import failed");
        }
        self.debouncer.finish(now);
        Some(result)
    }
}

impl Drop for SyncWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
