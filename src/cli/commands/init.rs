//! Initialize KotaDB in a project.
//!
//! Creates `<project>/.kotadb/` with the database, a default `config.json`,
//! and the export directory's `.gitignore` / `.gitattributes`. Running it
//! again is safe: existing files are left alone.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cli::commands::resolve_paths;
use crate::config::{project_data_dir, SyncConfig, CONFIG_FILE_NAME};
use crate::error::Result;
use crate::storage::SqliteStorage;
use crate::sync::{ensure_gitattributes, ensure_gitignore, merge_driver_git_config};

#[derive(Serialize)]
struct InitOutput {
    root: PathBuf,
    database: PathBuf,
    export_dir: PathBuf,
    created_database: bool,
    merge_driver: String,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns an error if a directory, the database or a git helper file cannot
/// be created.
pub fn execute(db: Option<&PathBuf>, export_dir: Option<&PathBuf>, json: bool) -> Result<()> {
    let paths = resolve_paths(db, export_dir)?;

    let data_dir = project_data_dir(&paths.root);
    fs::create_dir_all(&data_dir)?;
    write_default_config(&data_dir)?;

    let created_database = !paths.db.exists();
    SqliteStorage::open(&paths.db)?.close()?;

    fs::create_dir_all(&paths.export_dir)?;
    ensure_gitignore(&paths.export_dir)?;
    ensure_gitattributes(&paths.export_dir)?;

    let merge_driver = merge_driver_git_config();
    if json {
        let output = InitOutput {
            root: paths.root,
            database: paths.db,
            export_dir: paths.export_dir,
            created_database,
            merge_driver,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Initialized KotaDB in {}", paths.root.display());
        println!("  Database:         {}", paths.db.display());
        println!("  Export directory: {}", paths.export_dir.display());
        println!();
        println!("Register the JSONL merge driver once per clone:");
        println!("  {merge_driver}");
    }

    Ok(())
}

fn write_default_config(data_dir: &Path) -> Result<()> {
    let path = data_dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        let mut text = serde_json::to_string_pretty(&SyncConfig::default())?;
        text.push('\n');
        fs::write(&path, text)?;
    }
    Ok(())
}
