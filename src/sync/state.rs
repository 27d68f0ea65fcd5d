//! Export State: the last exported content hash per table.
//!
//! Stored in the `export_state` table of the same database, so a state row
//! and the data it fingerprints can never come from different databases.

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::sync::types::Table;

/// Fingerprint of one table as of its last written export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportState {
    pub table: Table,
    pub content_hash: String,
    pub row_count: usize,
    /// Unix milliseconds.
    pub exported_at: i64,
}

/// Load the state of one table, if it was ever exported.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn load_state(conn: &Connection, table: Table) -> rusqlite::Result<Option<ExportState>> {
    conn.query_row(
        "SELECT content_hash, row_count, exported_at FROM export_state WHERE table_name = ?1",
        [table.as_str()],
        |row| {
            let rows: i64 = row.get(1)?;
            Ok(ExportState {
                table,
                content_hash: row.get(0)?,
                row_count: usize::try_from(rows).unwrap_or(0),
                exported_at: row.get(2)?,
            })
        },
    )
    .optional()
}

/// Insert or replace the state of one table.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn save_state(conn: &Connection, state: &ExportState) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO export_state (table_name, content_hash, row_count, exported_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(table_name) DO UPDATE SET
           content_hash = excluded.content_hash,
           row_count = excluded.row_count,
           exported_at = excluded.exported_at",
        rusqlite::params![
            state.table.as_str(),
            state.content_hash,
            i64::try_from(state.row_count).unwrap_or(i64::MAX),
            state.exported_at
        ],
    )?;
    Ok(())
}

/// Forget all export state, forcing the next export to rewrite every table.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn reset_state(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM export_state", [])
}
