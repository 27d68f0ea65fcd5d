//! Sync command implementations (JSONL export/import).
//!
//! Files are written to the project's export directory (default
//! `<project>/.kotadb/`) so they can be committed alongside the code.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::cli::SyncCommands;
use crate::cli::commands::open_store;
use crate::error::Result;
use crate::store::Store;
use crate::sync::print_status;

const WATCH_TICK: Duration = Duration::from_millis(200);

/// Execute sync commands.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or the sync step fails.
pub fn execute(
    command: &SyncCommands,
    db: Option<&PathBuf>,
    export_dir: Option<&PathBuf>,
    json: bool,
) -> Result<()> {
    let mut store = open_store(db, export_dir)?;
    match command {
        SyncCommands::Export { force } => export(&mut store, *force, json),
        SyncCommands::Import { dir } => import(&mut store, dir.as_ref(), json),
        SyncCommands::Status => status(&store, json),
        SyncCommands::Watch { for_secs } => watch(&mut store, *for_secs, json),
        SyncCommands::Ack => ack(&store, json),
    }
}

fn export(store: &mut Store, force: bool, json: bool) -> Result<()> {
    let stats = store.export_now(force)?;

    if json {
        let output = serde_json::json!({
            "success": true,
            "output_dir": store.export_dir().display().to_string(),
            "stats": stats,
        });
        println!("{output}");
    } else if stats.is_empty() {
        println!("Export files are up to date.");
    } else {
        println!("Export complete: {}", store.export_dir().display());
        println!();
        for table in stats.tables.iter().filter(|t| t.written) {
            println!("  {:<18} {} rows", table.table.as_str(), table.rows);
        }
        println!();
        println!(
            "  {} table(s) written, {} unchanged",
            stats.written(),
            stats.tables.len() - stats.written()
        );
        if stats.manifest_cleared {
            println!("  Deletion manifest cleared");
        }
    }
    Ok(())
}

fn import(store: &mut Store, dir: Option<&PathBuf>, json: bool) -> Result<()> {
    let stats = store.import_now(dir.map(PathBuf::as_path))?;

    if json {
        let output = serde_json::json!({
            "success": true,
            "stats": stats,
        });
        println!("{output}");
        return Ok(());
    }

    println!("Import complete");
    println!();
    let deletions = &stats.deletions;
    if deletions.deleted + deletions.already_absent + deletions.unknown_tables > 0 {
        println!(
            "  Deletions: {} applied, {} already absent, {} unknown table",
            deletions.deleted, deletions.already_absent, deletions.unknown_tables
        );
    }
    for (table, table_stats) in &stats.tables {
        if table_stats.imported == 0 && table_stats.skipped == 0 {
            continue;
        }
        println!(
            "  {:<18} {} imported, {} skipped",
            table.as_str(),
            table_stats.imported,
            table_stats.skipped
        );
        for reason in &table_stats.diagnostics {
            println!("      {reason}");
        }
    }
    println!();
    println!(
        "  Total: {} rows imported, {} lines skipped",
        stats.total_imported(),
        stats.total_skipped()
    );
    Ok(())
}

fn status(store: &Store, json: bool) -> Result<()> {
    let status = store.status()?;
    if json {
        println!("{}", serde_json::to_string(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}

fn watch(store: &mut Store, for_secs: Option<u64>, json: bool) -> Result<()> {
    let until = for_secs.map(|s| Instant::now() + Duration::from_secs(s));
    if !json {
        println!("Watching {} (Ctrl-C to stop)", store.export_dir().display());
    }

    store.watch(WATCH_TICK, || until.is_some_and(|t| Instant::now() >= t))?;

    if json {
        println!("{}", serde_json::json!({ "success": true, "stopped": true }));
    }
    Ok(())
}

fn ack(store: &Store, json: bool) -> Result<()> {
    let cleared = store.acknowledge_synced()?;
    if json {
        println!("{}", serde_json::json!({ "success": true, "cleared": cleared }));
    } else {
        println!("Cleared {cleared} deletion entr{}.", if cleared == 1 { "y" } else { "ies" });
    }
    Ok(())
}
