//! KotaDB CLI entry point.

use clap::Parser;
use kota::cli::commands;
use kota::cli::{Cli, Commands};
use kota::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    init_tracing(cli.verbose, cli.quiet);

    // --json, or stdout is not a terminal
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,notify=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    let db = cli.db.as_ref();
    let export_dir = cli.export_dir.as_ref();

    match &cli.command {
        Commands::Init => commands::init::execute(db, export_dir, json),
        Commands::Version => commands::version::execute(json),

        // Queries
        Commands::Search { query, limit } => {
            commands::search::execute(query, *limit, db, export_dir, json)
        }
        Commands::Recent { repo, limit } => {
            commands::recent::execute(repo.as_deref(), *limit, db, export_dir, json)
        }
        Commands::Deps {
            file,
            repo,
            reverse,
            depth,
        } => commands::deps::execute(file, repo.as_deref(), *reverse, *depth, db, export_dir, json),

        // Sync
        Commands::Sync { command } => commands::sync::execute(command, db, export_dir, json),
        Commands::MergeDriver {
            base,
            ours,
            theirs,
            marker_size,
        } => commands::merge_driver::execute(base, ours, theirs, *marker_size, json),
    }
}
