//! Database schema definitions.
//!
//! The whole schema is one idempotent DDL script applied on every open.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the KotaDB database.
///
/// Note: Timestamps are stored as INTEGER (Unix milliseconds).
pub const SCHEMA_SQL: &str = r#"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Core Tables
-- ====================

-- Repositories: root of each indexed project
CREATE TABLE IF NOT EXISTS repositories (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    path TEXT,
    default_branch TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_repositories_name ON repositories(name);

-- Indexed files: one row per source file
CREATE TABLE IF NOT EXISTS indexed_files (
    id TEXT PRIMARY KEY,
    repository_id TEXT NOT NULL,
    path TEXT NOT NULL,
    language TEXT,
    content TEXT NOT NULL,
    size INTEGER NOT NULL DEFAULT 0,
    content_hash TEXT NOT NULL,
    indexed_at INTEGER NOT NULL,
    FOREIGN KEY (repository_id) REFERENCES repositories(id) ON DELETE CASCADE,
    UNIQUE(repository_id, path)
);

CREATE INDEX IF NOT EXISTS idx_indexed_files_repo ON indexed_files(repository_id);
CREATE INDEX IF NOT EXISTS idx_indexed_files_indexed_at ON indexed_files(indexed_at DESC);

-- Symbols: definitions extracted from files
CREATE TABLE IF NOT EXISTS symbols (
    id TEXT PRIMARY KEY,
    file_id TEXT NOT NULL,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    start_column INTEGER NOT NULL DEFAULT 0,
    end_line INTEGER NOT NULL,
    end_column INTEGER NOT NULL DEFAULT 0,
    metadata TEXT NOT NULL DEFAULT '{}',
    FOREIGN KEY (file_id) REFERENCES indexed_files(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_id);
CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);

-- Symbol references: use-sites of symbols
CREATE TABLE IF NOT EXISTS symbol_references (
    id TEXT PRIMARY KEY,
    symbol_id TEXT NOT NULL,
    file_id TEXT NOT NULL,
    line_number INTEGER NOT NULL,
    column_number INTEGER NOT NULL DEFAULT 0,
    context TEXT,
    FOREIGN KEY (symbol_id) REFERENCES symbols(id) ON DELETE CASCADE,
    FOREIGN KEY (file_id) REFERENCES indexed_files(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_symbol_references_symbol ON symbol_references(symbol_id);
CREATE INDEX IF NOT EXISTS idx_symbol_references_file ON symbol_references(file_id);

-- Dependencies: directed file graph edges (cycles allowed)
CREATE TABLE IF NOT EXISTS dependencies (
    id TEXT PRIMARY KEY,
    source_file_id TEXT NOT NULL,
    target_file_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    FOREIGN KEY (source_file_id) REFERENCES indexed_files(id) ON DELETE CASCADE,
    FOREIGN KEY (target_file_id) REFERENCES indexed_files(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_dependencies_source ON dependencies(source_file_id);
CREATE INDEX IF NOT EXISTS idx_dependencies_target ON dependencies(target_file_id);

-- Index jobs: one row per indexing run
CREATE TABLE IF NOT EXISTS index_jobs (
    id TEXT PRIMARY KEY,
    repository_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    files_total INTEGER NOT NULL DEFAULT 0,
    files_indexed INTEGER NOT NULL DEFAULT 0,
    symbols_extracted INTEGER NOT NULL DEFAULT 0,
    error TEXT,
    created_at INTEGER NOT NULL,
    started_at INTEGER,
    completed_at INTEGER,
    FOREIGN KEY (repository_id) REFERENCES repositories(id) ON DELETE CASCADE,
    CHECK (status IN ('pending', 'running', 'completed', 'failed'))
);

CREATE INDEX IF NOT EXISTS idx_index_jobs_repo ON index_jobs(repository_id, created_at DESC);

-- ====================
-- Sync State
-- ====================

-- Export state: last exported content hash per table (never exported itself)
CREATE TABLE IF NOT EXISTS export_state (
    table_name TEXT PRIMARY KEY,
    content_hash TEXT NOT NULL,
    row_count INTEGER NOT NULL DEFAULT 0,
    exported_at INTEGER NOT NULL
);

-- ====================
-- Full-Text Search
-- ====================

-- Keeps its own copy of path/content; joined back to indexed_files by file_id
CREATE VIRTUAL TABLE IF NOT EXISTS indexed_files_fts USING fts5(
    file_id UNINDEXED,
    path,
    content,
    tokenize='unicode61'
);

CREATE TRIGGER IF NOT EXISTS indexed_files_fts_insert
AFTER INSERT ON indexed_files
BEGIN
    INSERT INTO indexed_files_fts (file_id, path, content)
    VALUES (NEW.id, NEW.path, NEW.content);
END;

CREATE TRIGGER IF NOT EXISTS indexed_files_fts_delete
AFTER DELETE ON indexed_files
BEGIN
    DELETE FROM indexed_files_fts WHERE file_id = OLD.id;
END;

CREATE TRIGGER IF NOT EXISTS indexed_files_fts_update
AFTER UPDATE OF path, content ON indexed_files
BEGIN
    DELETE FROM indexed_files_fts WHERE file_id = OLD.id;
    INSERT INTO indexed_files_fts (file_id, path, content)
    VALUES (NEW.id, NEW.path, NEW.content);
END;
"#;

/// Apply the schema to the database.
///
/// This uses `execute_batch` to run the entire DDL script.
/// It is idempotent because all statements use `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns an error if the SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    // Set pragmas before schema creation
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_apply_schema() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("Failed to apply schema");

        let tables = table_names(&conn);
        for expected in [
            "repositories",
            "indexed_files",
            "symbols",
            "symbol_references",
            "dependencies",
            "index_jobs",
            "export_state",
            "indexed_files_fts",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("First apply failed");
        apply_schema(&conn).expect("Second apply failed");
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let fk_enabled: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk_enabled, 1);
    }

    #[test]
    fn test_fts_follows_file_writes() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        conn.execute_batch(
            "INSERT INTO repositories (id, name, created_at, updated_at) VALUES ('r1', 'repo', 0, 0);
             INSERT INTO indexed_files (id, repository_id, path, content, size, content_hash, indexed_at)
             VALUES ('f1', 'r1', 'a.ts', 'alpha beta', 10, 'h', 0);",
        )
        .unwrap();

        let count = |term: &str| -> i64 {
            conn.query_row(
                "SELECT COUNT(*) FROM indexed_files_fts WHERE indexed_files_fts MATCH ?1",
                [term],
                |row| row.get(0),
            )
            .unwrap()
        };
        assert_eq!(count("alpha"), 1);

        conn.execute("UPDATE indexed_files SET content = 'gamma' WHERE id = 'f1'", [])
            .unwrap();
        assert_eq!(count("alpha"), 0);
        assert_eq!(count("gamma"), 1);

        conn.execute("DELETE FROM indexed_files WHERE id = 'f1'", []).unwrap();
        assert_eq!(count("gamma"), 0);
    }

    #[test]
    fn test_job_status_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO repositories (id, name, created_at, updated_at) VALUES ('r1', 'repo', 0, 0)",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO index_jobs (id, repository_id, status, created_at) VALUES ('j1', 'r1', 'exploded', 0)",
            [],
        );
        assert!(result.is_err());
    }
}
