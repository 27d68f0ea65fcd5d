//! JSONL import functionality.
//!
//! Reads an export directory back into the database:
//!
//! 1. The deletion manifest (if present) is applied first, one batched delete
//!    per table.
//! 2. Table files are upserted by id, parents before children.
//!
//! Both steps share one immediate transaction. Bad lines (malformed JSON, no
//! id, constraint failures such as a dangling foreign key) are skipped and
//! reported; only transaction-level failures abort the import.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::storage::rows::{column_names, upsert_json};
use crate::storage::SqliteStorage;
use crate::sync::file::read_lines;
use crate::sync::manifest::{apply_entries, DeletionManifest};
use crate::sync::types::{ImportStats, SyncError, SyncResult, Table, TableImportStats};

/// Importer for JSONL sync files.
pub struct Importer<'a> {
    storage: &'a mut SqliteStorage,
    tables: Vec<Table>,
}

impl<'a> Importer<'a> {
    /// Create an importer for all synced tables.
    #[must_use]
    pub fn new(storage: &'a mut SqliteStorage) -> Self {
        Self {
            storage,
            tables: Table::ALL.to_vec(),
        }
    }

    /// Restrict the import to a subset of tables.
    ///
    /// Order does not matter; tables are always imported parents first.
    #[must_use]
    pub fn with_tables(mut self, tables: &[Table]) -> Self {
        self.tables = tables.to_vec();
        self
    }

    /// Import all JSONL files from a directory.
    ///
    /// Missing table files are skipped.
    ///
    /// # Errors
    ///
    /// Returns `ExportDirMissing` if `dir` does not exist, or an error if a
    /// file cannot be read or the transaction fails (nothing is applied then).
    pub fn import_dir(&mut self, dir: &Path) -> SyncResult<ImportStats> {
        if !dir.is_dir() {
            return Err(SyncError::ExportDirMissing(dir.display().to_string()));
        }

        let (deletions, malformed_deletions) = DeletionManifest::in_dir(dir).load()?;

        let mut tables = self.tables.clone();
        tables.sort_by_key(Table::insert_rank);
        tables.dedup();

        // Read everything before taking the write lock
        let mut inputs = Vec::new();
        for table in tables {
            let path = dir.join(table.file_name());
            if path.exists() {
                inputs.push((table, read_lines(&path)?));
            } else {
                debug!(table = %table, "No export file, skipping");
            }
        }

        let mut stats = self.storage.mutate("import", |tx, _ctx| {
            let mut stats = ImportStats {
                deletions: apply_entries(tx, &deletions)?,
                tables: BTreeMap::new(),
            };

            for (table, lines) in &inputs {
                let columns = column_names(tx, *table)?;
                let mut table_stats = TableImportStats::default();

                for (line_num, line) in lines {
                    let obj = match serde_json::from_str::<Value>(line) {
                        Ok(Value::Object(obj)) => obj,
                        Ok(_) => {
                            skip(&mut table_stats, *table, *line_num, "not a JSON object");
                            continue;
                        }
                        Err(e) => {
                            skip(&mut table_stats, *table, *line_num, &e.to_string());
                            continue;
                        }
                    };

                    if !has_usable_id(&obj) {
                        skip(&mut table_stats, *table, *line_num, "missing id");
                        continue;
                    }

                    match upsert_json(tx, *table, &columns, &obj) {
                        Ok(_) => table_stats.imported += 1,
                        Err(e) if is_row_level(&e) => {
                            skip(&mut table_stats, *table, *line_num, &e.to_string());
                        }
                        Err(e) => return Err(e.into()),
                    }
                }

                debug!(
                    table = %table,
                    imported = table_stats.imported,
                    skipped = table_stats.skipped,
                    "Imported table"
                );
                stats.tables.insert(*table, table_stats);
            }

            Ok(stats)
        })?;

        stats.deletions.malformed = malformed_deletions;
        info!(
            dir = %dir.display(),
            imported = stats.total_imported(),
            skipped = stats.total_skipped(),
            deleted = stats.deletions.deleted,
            "Import complete"
        );
        Ok(stats)
    }
}

fn skip(stats: &mut TableImportStats, table: Table, line: usize, reason: &str) {
    warn!(table = %table, line, reason, "Skipping import line");
    stats.skip(format!("{}:{line}: {reason}", table.file_name()));
}

fn has_usable_id(obj: &serde_json::Map<String, Value>) -> bool {
    match obj.get("id") {
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(_)) => true,
        _ => false,
    }
}

/// Errors that reject one row but leave the transaction usable.
fn is_row_level(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(
                e.code,
                rusqlite::ErrorCode::ConstraintViolation | rusqlite::ErrorCode::TypeMismatch
            )
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Dependency, IndexedFile, Reference, Repository, Symbol};
    use crate::storage::rows::dump_table;
    use crate::sync::export::Exporter;
    use crate::sync::types::DeletionEntry;
    use std::fs;
    use tempfile::TempDir;

    fn populated() -> SqliteStorage {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let repo = Repository::new("demo", Some("/work/demo".into()));
        storage.upsert_repository(&repo).unwrap();

        let a = IndexedFile::new(&repo.id, "src/a.ts", "import { b } from './b';\nexport const a = b;");
        let b = IndexedFile::new(&repo.id, "src/b.ts", "export const b = 1;");
        storage.upsert_files(&[a.clone(), b.clone()]).unwrap();

        let mut sym = Symbol::new(&b.id, "b", "variable", 1, 1);
        sym.metadata = sym.metadata.with("exported", serde_json::json!(true));
        storage.upsert_symbols(std::slice::from_ref(&sym)).unwrap();

        let mut reference = Reference::new(&sym.id, &a.id, 2, 17);
        reference.context = Some("export const a = b;".into());
        storage.upsert_references(&[reference]).unwrap();

        storage
            .upsert_dependencies(&[Dependency::new(&a.id, &b.id, "file_import")])
            .unwrap();

        let job = storage.create_job(&repo.id).unwrap();
        storage.start_job(&job.id).unwrap();
        storage.update_job_progress(&job.id, 2, 2, 1).unwrap();
        storage.complete_job(&job.id).unwrap();
        storage
    }

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_round_trip_into_fresh_database() {
        let temp_dir = TempDir::new().unwrap();
        let source = populated();
        Exporter::new(&source, temp_dir.path()).export(false).unwrap();

        let mut target = SqliteStorage::open_memory().unwrap();
        let stats = Importer::new(&mut target).import_dir(temp_dir.path()).unwrap();
        assert_eq!(stats.total_skipped(), 0);

        for table in Table::ALL {
            assert_eq!(
                dump_table(source.conn(), table).unwrap(),
                dump_table(target.conn(), table).unwrap(),
                "{table} differs after round trip"
            );
        }

        // The full-text index is rebuilt by the insert triggers
        assert_eq!(target.search("import", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_reimport_does_not_duplicate() {
        let temp_dir = TempDir::new().unwrap();
        let source = populated();
        Exporter::new(&source, temp_dir.path()).export(false).unwrap();

        let mut target = SqliteStorage::open_memory().unwrap();
        Importer::new(&mut target).import_dir(temp_dir.path()).unwrap();
        Importer::new(&mut target).import_dir(temp_dir.path()).unwrap();

        assert_eq!(
            dump_table(source.conn(), Table::IndexedFiles).unwrap(),
            dump_table(target.conn(), Table::IndexedFiles).unwrap()
        );
    }

    #[test]
    fn test_bad_lines_are_skipped_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        write(
            temp_dir.path(),
            "repositories.jsonl",
            concat!(
                "{\"id\":\"r1\",\"name\":\"ok\",\"created_at\":1,\"updated_at\":1}\n",
                "{this is not json\n",
                "[1,2,3]\n",
                "{\"name\":\"no id\",\"created_at\":1,\"updated_at\":1}\n",
            ),
        );
        write(
            temp_dir.path(),
            "indexed_files.jsonl",
            "{\"id\":\"f1\",\"repository_id\":\"missing\",\"path\":\"a\",\"content\":\"\",\"size\":0,\"content_hash\":\"h\",\"indexed_at\":0}\n",
        );

        let mut storage = SqliteStorage::open_memory().unwrap();
        let stats = Importer::new(&mut storage).import_dir(temp_dir.path()).unwrap();

        let repos = &stats.tables[&Table::Repositories];
        assert_eq!(repos.imported, 1);
        assert_eq!(repos.skipped, 3);
        assert_eq!(repos.diagnostics.len(), 3);

        let files = &stats.tables[&Table::IndexedFiles];
        assert_eq!(files.imported, 0);
        assert_eq!(files.skipped, 1, "dangling foreign key is a row-level skip");

        assert!(storage.get_repository("r1").unwrap().is_some());
    }

    #[test]
    fn test_manifest_applied_before_upserts() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = SqliteStorage::open_memory().unwrap();
        let repo = Repository::new("demo", None);
        storage.upsert_repository(&repo).unwrap();
        let stale = IndexedFile::new(&repo.id, "old.ts", "old");
        storage.upsert_files(std::slice::from_ref(&stale)).unwrap();

        Exporter::new(&storage, temp_dir.path()).export(false).unwrap();
        // Peer deleted old.ts and its export no longer lists it
        write(temp_dir.path(), "indexed_files.jsonl", "");
        DeletionManifest::in_dir(temp_dir.path())
            .record(&DeletionEntry::now(Table::IndexedFiles, &stale.id))
            .unwrap();

        let stats = Importer::new(&mut storage).import_dir(temp_dir.path()).unwrap();
        assert_eq!(stats.deletions.deleted, 1);
        assert!(storage.get_file(&stale.id).unwrap().is_none());
        assert!(storage.get_repository(&repo.id).unwrap().is_some());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let result = Importer::new(&mut storage).import_dir(Path::new("/nonexistent/kotadb"));
        assert!(matches!(result, Err(SyncError::ExportDirMissing(_))));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        write(
            temp_dir.path(),
            "repositories.jsonl",
            "{\"id\":\"r1\",\"name\":\"x\",\"created_at\":1,\"updated_at\":1,\"added_later\":\"v2\"}\n",
        );

        let mut storage = SqliteStorage::open_memory().unwrap();
        let stats = Importer::new(&mut storage)
            .with_tables(&[Table::Repositories])
            .import_dir(temp_dir.path())
            .unwrap();
        assert_eq!(stats.total_imported(), 1);
    }
}
