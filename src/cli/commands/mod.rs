//! Command implementations.

pub mod deps;
pub mod init;
pub mod merge_driver;
pub mod recent;
pub mod search;
pub mod sync;
pub mod version;

use std::path::PathBuf;

use crate::config::{project_data_dir, project_root, resolve_db_path, resolve_export_dir, SyncConfig};
use crate::error::{Error, Result};
use crate::store::Store;

/// Paths a command resolved before opening anything.
#[derive(Debug)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub db: PathBuf,
    pub export_dir: PathBuf,
    pub config: SyncConfig,
}

/// Resolve database, export directory and config for the current project.
///
/// # Errors
///
/// Returns `Config` if `.kotadb/config.json` is invalid.
pub fn resolve_paths(db: Option<&PathBuf>, export_dir: Option<&PathBuf>) -> Result<ProjectPaths> {
    let root = project_root();
    let config = SyncConfig::load(&project_data_dir(&root))?;
    let db = resolve_db_path(db.map(PathBuf::as_path), &root);
    let export_dir = resolve_export_dir(export_dir.map(PathBuf::as_path), &root, &config);
    Ok(ProjectPaths {
        root,
        db,
        export_dir,
        config,
    })
}

/// Open the project store. The database must already exist.
///
/// # Errors
///
/// Returns `NotInitialized` if there is no database yet.
pub fn open_store(db: Option<&PathBuf>, export_dir: Option<&PathBuf>) -> Result<Store> {
    let paths = resolve_paths(db, export_dir)?;
    if !paths.db.exists() {
        return Err(Error::NotInitialized { path: paths.db });
    }
    Store::open(&paths.db, paths.export_dir, paths.config)
}
