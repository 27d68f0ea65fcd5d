//! CLI definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// KotaDB - local-first code intelligence with git-native sync
#[derive(Parser, Debug)]
#[command(name = "kota", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: <project>/.kotadb/kota.db)
    #[arg(long, global = true, env = "KOTADB_DB")]
    pub db: Option<PathBuf>,

    /// JSONL export directory (default: <project>/.kotadb/)
    #[arg(long, global = true, env = "KOTADB_EXPORT_DIR")]
    pub export_dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize KotaDB in the current project
    Init,

    /// Print version information
    Version,

    /// Full-text search over indexed file content
    Search {
        /// Search terms
        query: String,

        /// Maximum results
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// List recently indexed files
    Recent {
        /// Only files of this repository (id)
        #[arg(long)]
        repo: Option<String>,

        /// Maximum files to return
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Show the dependency graph around a file
    Deps {
        /// File id, or a path when --repo is given
        file: String,

        /// Repository id used to resolve FILE as a path
        #[arg(long)]
        repo: Option<String>,

        /// Show files that depend on FILE instead of its dependencies
        #[arg(long)]
        reverse: bool,

        /// Maximum traversal depth
        #[arg(short, long)]
        depth: Option<u32>,
    },

    /// Sync with JSONL files
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },

    /// Three-way JSONL merge, invoked by git
    ///
    /// Register with:
    /// git config merge.kotadb.driver "kota merge-driver %O %A %B %L"
    MergeDriver {
        /// Common ancestor version (%O)
        base: PathBuf,

        /// Current branch version (%A); the result is written here
        ours: PathBuf,

        /// Other branch version (%B)
        theirs: PathBuf,

        /// Conflict marker size (%L); accepted for compatibility
        marker_size: Option<u32>,
    },
}

// ============================================================================
// Sync Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum SyncCommands {
    /// Export tables to JSONL
    Export {
        /// Rewrite every table even if unchanged
        #[arg(long)]
        force: bool,
    },

    /// Import from JSONL
    Import {
        /// Directory to import from (default: the export directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Show sync status
    Status,

    /// Re-import on file changes and export pending writes
    Watch {
        /// Stop after this many seconds (default: run until killed)
        #[arg(long)]
        for_secs: Option<u64>,
    },

    /// Clear the deletion manifest once peers have pulled it
    Ack,
}
