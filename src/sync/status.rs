//! Sync status display.
//!
//! This module reports, per table, the database row count, the last export
//! fingerprint and what is on disk, plus the pending deletion count.

use std::path::Path;

use colored::Colorize;

use crate::storage::rows::{count_rows, dump_table};
use crate::storage::SqliteStorage;
use crate::sync::file::{count_lines, file_size, join_lines};
use crate::sync::hash::{content_hash_str, has_changed};
use crate::sync::manifest::DeletionManifest;
use crate::sync::state::load_state;
use crate::sync::types::{SyncResult, SyncStatus, Table, TableStatus};

/// Get the current sync status of an export directory.
///
/// # Errors
///
/// Returns an error if database queries fail or the manifest is unreadable.
pub fn get_sync_status(
    storage: &SqliteStorage,
    export_dir: &Path,
    tables: &[Table],
) -> SyncResult<SyncStatus> {
    let conn = storage.conn();
    let mut statuses = Vec::with_capacity(tables.len());

    for table in tables {
        let path = export_dir.join(table.file_name());
        let state = load_state(conn, *table)?;
        let current = content_hash_str(&join_lines(&dump_table(conn, *table)?));
        let last_hash = state.as_ref().map(|s| s.content_hash.clone());

        statuses.push(TableStatus {
            table: *table,
            db_rows: count_rows(conn, *table)?,
            file_lines: count_lines(&path)?,
            file_size: file_size(&path),
            changed: has_changed(&current, last_hash.as_deref()) || !path.exists(),
            last_hash,
            last_exported_at: state.map(|s| s.exported_at),
        });
    }

    Ok(SyncStatus {
        export_dir: export_dir.display().to_string(),
        tables: statuses,
        pending_deletions: DeletionManifest::in_dir(export_dir).pending()?,
    })
}

/// Print sync status to stdout in a human-readable format.
pub fn print_status(status: &SyncStatus) {
    println!("{}", "Sync Status".bold().underline());
    println!("  Export dir: {}", status.export_dir);
    println!();

    println!("{}", "Tables:".blue().bold());
    for table in &status.tables {
        let marker = if table.changed {
            "changed".yellow()
        } else {
            "clean".green()
        };
        let exported = table
            .last_exported_at
            .and_then(chrono::DateTime::from_timestamp_millis)
            .map_or_else(|| "never".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
        println!(
            "  {:<18} {:>6} rows  {:>6} lines  {:>9}  exported {}  [{}]",
            table.table.as_str(),
            table.db_rows,
            table.file_lines,
            format_size(table.file_size),
            exported,
            marker
        );
    }
    println!();

    if status.pending_deletions > 0 {
        println!(
            "{} {}",
            "Pending deletions:".yellow().bold(),
            status.pending_deletions
        );
        println!(
            "{}",
            "Run 'kota sync ack' once peers have pulled them.".dimmed()
        );
    }

    let changed = status.changed_tables();
    if changed > 0 {
        println!(
            "{}",
            format!("{changed} table(s) changed. Run 'kota sync export' to write them.").dimmed()
        );
    } else {
        println!("{}", "Export files are up to date.".green());
    }
}

/// Format a byte size as a human-readable string.
#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
