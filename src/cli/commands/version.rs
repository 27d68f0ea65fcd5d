//! `kota version`.

use serde::Serialize;

use crate::error::Result;
use crate::storage::schema::CURRENT_SCHEMA_VERSION;
use crate::sync::Table;

#[derive(Serialize)]
struct VersionOutput<'a> {
    version: &'a str,
    build: &'a str,
    schema_version: i32,
    tables: Vec<&'static str>,
}

/// Print the crate version, build profile and the synced table set.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let build = if cfg!(debug_assertions) { "dev" } else { "release" };

    if json {
        let output = VersionOutput {
            version,
            build,
            schema_version: CURRENT_SCHEMA_VERSION,
            tables: Table::ALL.iter().map(Table::as_str).collect(),
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("kota {version} ({build}, schema v{CURRENT_SCHEMA_VERSION})");
    }
    Ok(())
}
