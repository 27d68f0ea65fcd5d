//! `kota search`: full-text search over indexed content.

use std::path::PathBuf;

use colored::Colorize;

use crate::cli::commands::open_store;
use crate::error::Result;

/// Execute the search command.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or the query fails.
pub fn execute(
    query: &str,
    limit: u32,
    db: Option<&PathBuf>,
    export_dir: Option<&PathBuf>,
    json: bool,
) -> Result<()> {
    let store = open_store(db, export_dir)?;
    let results = store.search(query, limit)?;

    if json {
        let output = serde_json::json!({
            "query": query,
            "count": results.len(),
            "results": results,
        });
        println!("{output}");
        return Ok(());
    }

    if results.is_empty() {
        println!("No matches for \"{query}\".");
        return Ok(());
    }

    for result in &results {
        println!("{}  {}", result.path.bold(), result.file_id.dimmed());
        let snippet = result
            .snippet
            .replace("<mark>", "")
            .replace("</mark>", "");
        println!("    {}", snippet.trim().replace('\n', " "));
    }
    println!();
    println!("{} match(es)", results.len());
    Ok(())
}
