//! `kota deps`: walk the dependency graph from one file.

use std::path::PathBuf;

use colored::Colorize;

use crate::cli::commands::open_store;
use crate::error::{Error, Result};

/// Execute the deps command.
///
/// `file` is a file id, or a repository-relative path when `repo` is given.
///
/// # Errors
///
/// Returns `FileNotFound` if the path does not resolve, or an error if the
/// traversal fails.
pub fn execute(
    file: &str,
    repo: Option<&str>,
    reverse: bool,
    depth: Option<u32>,
    db: Option<&PathBuf>,
    export_dir: Option<&PathBuf>,
    json: bool,
) -> Result<()> {
    let store = open_store(db, export_dir)?;

    let file_id = match repo {
        Some(repo) => store
            .resolve_path(repo, file)?
            .ok_or_else(|| Error::FileNotFound {
                id: format!("{repo}:{file}"),
            })?,
        None => file.to_string(),
    };

    let nodes = if reverse {
        store.dependents(&file_id, depth)?
    } else {
        store.dependencies(&file_id, depth)?
    };
    let direction = if reverse { "dependents" } else { "dependencies" };

    if json {
        let output = serde_json::json!({
            "file_id": file_id,
            "direction": direction,
            "count": nodes.len(),
            "nodes": nodes,
        });
        println!("{output}");
        return Ok(());
    }

    if nodes.is_empty() {
        println!("No {direction} for {file_id}.");
        return Ok(());
    }

    println!("{} of {}", direction.bold(), file_id);
    for node in &nodes {
        let indent = "  ".repeat(usize::try_from(node.level).unwrap_or(1));
        println!("{indent}{} {}", node.path, format!("[{}]", node.level).dimmed());
    }
    Ok(())
}
