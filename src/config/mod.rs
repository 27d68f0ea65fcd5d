//! Configuration management.
//!
//! This module resolves where the database and the export directory live and
//! loads the project-level [`SyncConfig`].
//!
//! # Layout
//!
//! Every project keeps its state under `<project>/.kotadb/`:
//! - **Database**: `kota.db` (ignored by git)
//! - **Exports**: `{table}.jsonl` plus `.deletions.jsonl` (committed)
//! - **Config**: `config.json` (optional)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sync::Table;

/// Name of the per-project data directory.
pub const DATA_DIR_NAME: &str = ".kotadb";

/// Database file name inside the data directory.
pub const DB_FILE_NAME: &str = "kota.db";

/// Config file name inside the data directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Get the git repository root directory.
fn git_toplevel() -> Option<PathBuf> {
    std::process::Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| PathBuf::from(String::from_utf8_lossy(&o.stdout).trim().to_string()))
        .filter(|p| !p.as_os_str().is_empty())
}

/// Get the project root.
///
/// The git top-level directory when run inside a work tree, otherwise the
/// current directory, otherwise the home directory.
#[must_use]
pub fn project_root() -> PathBuf {
    git_toplevel()
        .or_else(|| std::env::current_dir().ok())
        .or_else(|| directories::BaseDirs::new().map(|b| b.home_dir().to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// The project's `.kotadb/` directory.
#[must_use]
pub fn project_data_dir(root: &Path) -> PathBuf {
    root.join(DATA_DIR_NAME)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve the database path.
///
/// Priority:
/// 1. `explicit_path` (the `--db` flag, which clap also fills from `KOTADB_DB`)
/// 2. `KOTADB_DB` environment variable
/// 3. `<project>/.kotadb/kota.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>, root: &Path) -> PathBuf {
    if let Some(path) = explicit_path {
        return path.to_path_buf();
    }

    if let Some(db_path) = non_empty_env("KOTADB_DB") {
        return PathBuf::from(db_path);
    }

    project_data_dir(root).join(DB_FILE_NAME)
}

/// Resolve the export directory.
///
/// Priority:
/// 1. `explicit_dir` (the `--export-dir` flag)
/// 2. `KOTADB_EXPORT_DIR` environment variable
/// 3. `export_dir` in `.kotadb/config.json`, relative to the project root
/// 4. `<project>/.kotadb/`
#[must_use]
pub fn resolve_export_dir(explicit_dir: Option<&Path>, root: &Path, config: &SyncConfig) -> PathBuf {
    if let Some(dir) = explicit_dir {
        return dir.to_path_buf();
    }

    if let Some(dir) = non_empty_env("KOTADB_EXPORT_DIR") {
        return PathBuf::from(dir);
    }

    match &config.export_dir {
        Some(dir) => root.join(dir),
        None => project_data_dir(root),
    }
}

fn default_tables() -> Vec<Table> {
    Table::ALL.to_vec()
}

const fn default_export_debounce_ms() -> u64 {
    5_000
}

const fn default_import_debounce_ms() -> u64 {
    1_000
}

/// Project-level sync configuration (`.kotadb/config.json`).
///
/// Every field is optional in the file:
/// ```json
/// { "tables": ["repositories", "indexed_files"], "export_debounce_ms": 2000 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Tables to export and import, kept in dependency order.
    #[serde(default = "default_tables")]
    pub tables: Vec<Table>,

    /// Export directory, relative to the project root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<PathBuf>,

    #[serde(default = "default_export_debounce_ms")]
    pub export_debounce_ms: u64,

    #[serde(default = "default_import_debounce_ms")]
    pub import_debounce_ms: u64,

    /// Clear the deletion manifest after every export instead of on `sync ack`.
    #[serde(default)]
    pub clear_manifest_after_export: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tables: default_tables(),
            export_dir: None,
            export_debounce_ms: default_export_debounce_ms(),
            import_debounce_ms: default_import_debounce_ms(),
            clear_manifest_after_export: false,
        }
    }
}

impl SyncConfig {
    /// Load `config.json` from a data directory, falling back to defaults
    /// when the file is absent, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file exists but is not valid config JSON or an
    /// override is not a number.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE_NAME);
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            serde_json::from_str::<Self>(&text)
                .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?
        } else {
            Self::default()
        };

        if let Some(ms) = env_millis("KOTADB_EXPORT_DEBOUNCE_MS")? {
            config.export_debounce_ms = ms;
        }
        if let Some(ms) = env_millis("KOTADB_IMPORT_DEBOUNCE_MS")? {
            config.import_debounce_ms = ms;
        }

        config.normalize();
        Ok(config)
    }

    /// Sort tables into dependency order and drop duplicates.
    pub fn normalize(&mut self) {
        self.tables.sort_by_key(Table::insert_rank);
        self.tables.dedup();
    }

    #[must_use]
    pub const fn export_window(&self) -> Duration {
        Duration::from_millis(self.export_debounce_ms)
    }

    #[must_use]
    pub const fn import_window(&self) -> Duration {
        Duration::from_millis(self.import_debounce_ms)
    }
}

fn env_millis(key: &str) -> Result<Option<u64>> {
    non_empty_env(key)
        .map(|v| {
            v.trim()
                .parse::<u64>()
                .map_err(|_| Error::Config(format!("{key} must be a number of milliseconds, got '{v}'")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_db_path_with_explicit() {
        let explicit = PathBuf::from("/custom/path/db.sqlite");
        let result = resolve_db_path(Some(&explicit), Path::new("/project"));
        assert_eq!(result, explicit);
    }

    #[test]
    fn test_export_dir_prefers_flag_then_config() {
        let root = Path::new("/project");
        let mut config = SyncConfig::default();
        config.export_dir = Some(PathBuf::from("sync"));

        let flag = PathBuf::from("/elsewhere");
        assert_eq!(resolve_export_dir(Some(&flag), root, &config), flag);
        if std::env::var("KOTADB_EXPORT_DIR").is_err() {
            assert_eq!(resolve_export_dir(None, root, &config), root.join("sync"));
            assert_eq!(
                resolve_export_dir(None, root, &SyncConfig::default()),
                root.join(".kotadb")
            );
        }
    }

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.tables, Table::ALL.to_vec());
        assert_eq!(config.export_window(), Duration::from_secs(5));
        assert_eq!(config.import_window(), Duration::from_secs(1));
        assert!(!config.clear_manifest_after_export);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = SyncConfig::load(dir.path()).unwrap();
        assert_eq!(config.tables.len(), Table::ALL.len());
    }

    #[test]
    fn test_load_partial_file_orders_tables() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"tables":["symbols","repositories","symbols"],"clear_manifest_after_export":true}"#,
        )
        .unwrap();

        let config = SyncConfig::load(dir.path()).unwrap();
        assert_eq!(config.tables, vec![Table::Repositories, Table::Symbols]);
        assert!(config.clear_manifest_after_export);
    }

    #[test]
    fn test_load_rejects_unknown_table() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), r#"{"tables":["sessions"]}"#).unwrap();
        assert!(matches!(SyncConfig::load(dir.path()), Err(Error::Config(_))));
    }
}
