//! `kota recent`: most recently indexed files.

use std::path::PathBuf;

use crate::cli::commands::open_store;
use crate::error::Result;

/// Execute the recent command.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or the query fails.
pub fn execute(
    repo: Option<&str>,
    limit: u32,
    db: Option<&PathBuf>,
    export_dir: Option<&PathBuf>,
    json: bool,
) -> Result<()> {
    let store = open_store(db, export_dir)?;
    let files = store.list_recent(limit, repo)?;

    if json {
        let rows: Vec<_> = files
            .iter()
            .map(|f| {
                serde_json::json!({
                    "id": f.id,
                    "repository_id": f.repository_id,
                    "path": f.path,
                    "language": f.language,
                    "size": f.size,
                    "indexed_at": f.indexed_at,
                })
            })
            .collect();
        println!("{}", serde_json::json!({ "count": rows.len(), "files": rows }));
        return Ok(());
    }

    if files.is_empty() {
        println!("No indexed files.");
        return Ok(());
    }

    for file in &files {
        let when = chrono::DateTime::from_timestamp_millis(file.indexed_at)
            .map_or_else(|| "?".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string());
        println!(
            "{when}  {:<10} {}  ({})",
            file.language.as_deref().unwrap_or("-"),
            file.path,
            file.id
        );
    }
    Ok(())
}
