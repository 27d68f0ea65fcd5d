//! Atomic file operations for sync.
//!
//! This module provides safe file operations that prevent data corruption:
//! - Atomic writes: write to temp file, sync to disk, then rename
//! - JSONL appending with fsync for durability

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::sync::types::{SyncError, SyncResult, JSONL_EXTENSION, MANIFEST_FILE_NAME};

/// Name of the git merge driver registered for exported files.
pub const MERGE_DRIVER_NAME: &str = "kotadb";

/// Temp path next to `path`, unique per process.
///
/// Lives in the same directory so the final rename stays on one filesystem.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

/// Write content to a file atomically.
///
/// This function:
/// 1. Writes content to a temporary file in the same directory
/// 2. Calls `fsync` to ensure data is on disk
/// 3. Atomically renames the temp file to the target path
///
/// If any step fails, the original file (if any) remains untouched and a
/// concurrent reader sees either the old or the new content, never a mix.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &str) -> SyncResult<()> {
    let temp_path = temp_path_for(path);

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let written = (|| -> std::io::Result<()> {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
        writer.get_ref().sync_all()
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    Ok(())
}

/// Append one line to a JSONL file, creating it if needed.
///
/// The file is synced after the append for durability.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or written.
pub fn append_line(path: &Path, line: &str) -> SyncResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    file.sync_all()?;

    Ok(())
}

/// Join lines into JSONL content (one trailing newline per line).
#[must_use]
pub fn join_lines<S: AsRef<str>>(lines: &[S]) -> String {
    let mut content = String::new();
    for line in lines {
        content.push_str(line.as_ref());
        content.push('\n');
    }
    content
}

/// Read the non-blank lines of a file with their 1-indexed line numbers.
///
/// # Errors
///
/// Returns `FileNotFound` if the file does not exist, or an IO error.
pub fn read_lines(path: &Path) -> SyncResult<Vec<(usize, String)>> {
    if !path.exists() {
        return Err(SyncError::FileNotFound(path.display().to_string()));
    }

    let reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            lines.push((idx + 1, trimmed.to_string()));
        }
    }
    Ok(lines)
}

/// Count the number of lines in a JSONL file.
///
/// Returns 0 for a missing file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn count_lines(path: &Path) -> SyncResult<usize> {
    if !path.exists() {
        return Ok(0);
    }

    let reader = BufReader::new(File::open(path)?);
    let count = reader
        .lines()
        .map_while(Result::ok)
        .filter(|l| !l.trim().is_empty())
        .count();
    Ok(count)
}

/// Get the size of a file in bytes.
///
/// Returns 0 if the file doesn't exist.
#[must_use]
pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Whether a path is a table export file the watcher should react to.
///
/// Only `*.jsonl` counts, and the deletion manifest is excluded: it is
/// consumed by imports, never a trigger on its own.
#[must_use]
pub fn is_tracked_table_file(path: &Path) -> bool {
    let has_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == JSONL_EXTENSION);
    let is_manifest = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n == MANIFEST_FILE_NAME);
    has_ext && !is_manifest
}

/// Generate .gitignore content for the `.kotadb` directory.
///
/// Uses a whitelist pattern: ignore everything by default, then explicitly
/// include only the JSONL sync files that should be tracked in git.
///
/// This prevents accidentally committing:
/// - The SQLite database and its WAL files
/// - Temporary files from in-flight atomic writes
#[must_use]
pub fn gitignore_content() -> &'static str {
    r"# KotaDB sync directory
# Whitelist pattern: ignore everything except JSONL export files

# Ignore everything by default
*

# Allow git metadata files
!.gitignore
!.gitattributes

# Allow JSONL sync files (tables and the deletion manifest)
!*.jsonl
"
}

/// Generate .gitattributes content routing JSONL merges through the driver.
///
/// Table files go through the id-keyed driver. The deletion manifest is a
/// plain log keyed by (table, id), so it uses git's line union instead; the
/// later line overrides the catch-all.
#[must_use]
pub fn gitattributes_content() -> String {
    format!("*.{JSONL_EXTENSION} merge={MERGE_DRIVER_NAME}\n{MANIFEST_FILE_NAME} merge=union\n")
}

/// The `git config` line that registers the merge driver.
#[must_use]
pub fn merge_driver_git_config() -> String {
    format!(
        "git config merge.{MERGE_DRIVER_NAME}.driver \"kota merge-driver %O %A %B %L\""
    )
}

fn ensure_file(path: &Path, content: &str) -> SyncResult<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

/// Ensure .gitignore exists in the export directory.
///
/// If the file already exists, it is not modified (user may have customized it).
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn ensure_gitignore(export_dir: &Path) -> SyncResult<()> {
    ensure_file(&export_dir.join(".gitignore"), gitignore_content())
}

/// Ensure .gitattributes exists in the export directory.
///
/// If the file already exists, it is not modified.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn ensure_gitattributes(export_dir: &Path) -> SyncResult<()> {
    ensure_file(&export_dir.join(".gitattributes"), &gitattributes_content())
}
