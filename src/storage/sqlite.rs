//! SQLite storage implementation.
//!
//! This module provides the main storage backend for KotaDB using SQLite.
//! It follows the MutationContext pattern for transaction discipline and
//! tombstone tracking.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Row, Transaction};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{
    now_millis, Dependency, IndexJob, IndexedFile, JobStatus, Reference, Repository, Symbol,
};
use crate::storage::schema::apply_schema;
use crate::sync::{DeletionEntry, DeletionManifest, Table};

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
    /// Where tombstones go; removes are not propagated without one.
    manifest: Option<DeletionManifest>,
}

/// Context for a mutation operation, tracking side effects.
///
/// Passed to mutation closures so removes can record tombstones that are
/// appended to the deletion manifest before the transaction commits.
/// Local writes record their ids too: a row written again here must not be
/// deleted by a tombstone still sitting in the manifest.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Deletions recorded by this operation.
    pub tombstones: Vec<DeletionEntry>,
    /// Rows created or updated by this operation.
    pub written: Vec<(Table, String)>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            tombstones: Vec::new(),
            written: Vec::new(),
        }
    }

    /// Record that a row was written locally.
    pub fn record_write(&mut self, table: Table, id: &str) {
        self.written.push((table, id.to_string()));
    }

    /// Record that a row was deleted so peers can replay the delete.
    pub fn record_deletion(&mut self, table: Table, id: &str) {
        self.tombstones.push(DeletionEntry::now(table, id));
    }
}

/// A homogeneous batch of rows written in one transaction.
#[derive(Debug, Clone)]
pub enum WriteBatch {
    Repositories(Vec<Repository>),
    Files(Vec<IndexedFile>),
    Symbols(Vec<Symbol>),
    References(Vec<Reference>),
    Dependencies(Vec<Dependency>),
    IndexJobs(Vec<IndexJob>),
}

impl WriteBatch {
    /// Table the batch writes to.
    #[must_use]
    pub const fn table(&self) -> Table {
        match self {
            Self::Repositories(_) => Table::Repositories,
            Self::Files(_) => Table::IndexedFiles,
            Self::Symbols(_) => Table::Symbols,
            Self::References(_) => Table::SymbolReferences,
            Self::Dependencies(_) => Table::Dependencies,
            Self::IndexJobs(_) => Table::IndexJobs,
        }
    }

    /// Number of rows in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Repositories(v) => v.len(),
            Self::Files(v) => v.len(),
            Self::Symbols(v) => v.len(),
            Self::References(v) => v.len(),
            Self::Dependencies(v) => v.len(),
            Self::IndexJobs(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of the rows in the batch.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        match self {
            Self::Repositories(v) => v.iter().map(|r| r.id.as_str()).collect(),
            Self::Files(v) => v.iter().map(|r| r.id.as_str()).collect(),
            Self::Symbols(v) => v.iter().map(|r| r.id.as_str()).collect(),
            Self::References(v) => v.iter().map(|r| r.id.as_str()).collect(),
            Self::Dependencies(v) => v.iter().map(|r| r.id.as_str()).collect(),
            Self::IndexJobs(v) => v.iter().map(|r| r.id.as_str()).collect(),
        }
    }
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        apply_schema(&conn)?;
        debug!(path = %path.display(), "Opened database");
        Ok(Self {
            conn,
            manifest: None,
        })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            conn,
            manifest: None,
        })
    }

    /// Attach the deletion manifest that removes append to.
    #[must_use]
    pub fn with_manifest(mut self, manifest: DeletionManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    /// The attached deletion manifest, if any.
    #[must_use]
    pub fn manifest(&self) -> Option<&DeletionManifest> {
        self.manifest.as_ref()
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Close the connection, reporting any error from SQLite.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite refuses to close (e.g. unfinalized statements).
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::Database(e))
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// This method:
    /// 1. Begins an IMMEDIATE transaction (for write locking)
    /// 2. Executes the mutation closure
    /// 3. Drops manifest entries for rows the mutation wrote again
    /// 4. Appends recorded tombstones to the deletion manifest
    /// 5. Commits (or rolls back on error)
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op);

        // Execute the mutation
        let result = f(&tx, &mut ctx)?;

        if !ctx.written.is_empty() {
            if let Some(manifest) = &self.manifest {
                manifest.forget(&ctx.written)?;
            }
        }

        if !ctx.tombstones.is_empty() {
            match &self.manifest {
                Some(manifest) => manifest.record_all(&ctx.tombstones)?,
                None => warn!(
                    op = %ctx.op_name,
                    count = ctx.tombstones.len(),
                    "No deletion manifest attached; deletes will not propagate"
                ),
            }
        }

        tx.commit()?;

        Ok(result)
    }

    // ======================
    // Repository Operations
    // ======================

    /// Insert or update a repository by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn upsert_repository(&mut self, repo: &Repository) -> Result<()> {
        self.mutate("upsert_repository", |tx, ctx| {
            put_repository(tx, repo)?;
            ctx.record_write(Table::Repositories, &repo.id);
            Ok(())
        })
    }

    /// Get a repository by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_repository(&self, id: &str) -> Result<Option<Repository>> {
        let repo = self
            .conn
            .query_row(
                "SELECT id, name, path, default_branch, created_at, updated_at
                 FROM repositories WHERE id = ?1",
                [id],
                map_repository,
            )
            .optional()?;
        Ok(repo)
    }

    /// Find a repository by its display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn find_repository_by_name(&self, name: &str) -> Result<Option<Repository>> {
        let repo = self
            .conn
            .query_row(
                "SELECT id, name, path, default_branch, created_at, updated_at
                 FROM repositories WHERE name = ?1 ORDER BY created_at LIMIT 1",
                [name],
                map_repository,
            )
            .optional()?;
        Ok(repo)
    }

    /// List all repositories by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_repositories(&self) -> Result<Vec<Repository>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, path, default_branch, created_at, updated_at
             FROM repositories ORDER BY name, id",
        )?;
        let repos = stmt
            .query_map([], map_repository)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(repos)
    }

    // ================
    // File Operations
    // ================

    /// Insert or update files by id in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; nothing is committed in that case.
    pub fn upsert_files(&mut self, files: &[IndexedFile]) -> Result<usize> {
        self.batch_write(&WriteBatch::Files(files.to_vec()))
    }

    /// Get a file by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_file(&self, id: &str) -> Result<Option<IndexedFile>> {
        let file = self
            .conn
            .query_row(
                "SELECT id, repository_id, path, language, content, size, content_hash, indexed_at
                 FROM indexed_files WHERE id = ?1",
                [id],
                map_file,
            )
            .optional()?;
        Ok(file)
    }

    /// List the files of one repository by path.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_files(&self, repository_id: &str) -> Result<Vec<IndexedFile>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, repository_id, path, language, content, size, content_hash, indexed_at
             FROM indexed_files WHERE repository_id = ?1 ORDER BY path",
        )?;
        let files = stmt
            .query_map([repository_id], map_file)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(files)
    }

    /// Remove a file and, by cascade, its symbols, references and edges.
    ///
    /// Only the file itself is tombstoned; peers cascade the same way.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete or the manifest append fails.
    pub fn remove_file(&mut self, id: &str) -> Result<bool> {
        self.remove(Table::IndexedFiles, id)
    }

    // ============================
    // Symbol / Graph Operations
    // ============================

    /// Insert or update symbols by id in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; nothing is committed in that case.
    pub fn upsert_symbols(&mut self, symbols: &[Symbol]) -> Result<usize> {
        self.batch_write(&WriteBatch::Symbols(symbols.to_vec()))
    }

    /// Insert or update references by id in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; nothing is committed in that case.
    pub fn upsert_references(&mut self, references: &[Reference]) -> Result<usize> {
        self.batch_write(&WriteBatch::References(references.to_vec()))
    }

    /// Insert or update dependency edges by id in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; nothing is committed in that case.
    pub fn upsert_dependencies(&mut self, deps: &[Dependency]) -> Result<usize> {
        self.batch_write(&WriteBatch::Dependencies(deps.to_vec()))
    }

    /// Write a batch atomically with upsert-by-id semantics.
    ///
    /// Every row goes through one cached prepared statement inside a single
    /// immediate transaction; any failure rolls back the whole batch.
    ///
    /// # Errors
    ///
    /// Returns an error if any row violates a constraint or the write fails.
    pub fn batch_write(&mut self, batch: &WriteBatch) -> Result<usize> {
        let table = batch.table();
        let written = self.mutate("batch_write", |tx, ctx| {
            let mut written = 0;
            match batch {
                WriteBatch::Repositories(rows) => {
                    for row in rows {
                        written += put_repository(tx, row)?;
                    }
                }
                WriteBatch::Files(rows) => {
                    for row in rows {
                        written += put_file(tx, row)?;
                    }
                }
                WriteBatch::Symbols(rows) => {
                    for row in rows {
                        written += put_symbol(tx, row)?;
                    }
                }
                WriteBatch::References(rows) => {
                    for row in rows {
                        written += put_reference(tx, row)?;
                    }
                }
                WriteBatch::Dependencies(rows) => {
                    for row in rows {
                        written += put_dependency(tx, row)?;
                    }
                }
                WriteBatch::IndexJobs(rows) => {
                    for row in rows {
                        written += put_job(tx, row)?;
                    }
                }
            }
            for id in batch.ids() {
                ctx.record_write(table, id);
            }
            Ok(written)
        })?;
        debug!(table = %table, rows = written, "Batch written");
        Ok(written)
    }

    /// Delete one row by id and tombstone it.
    ///
    /// Returns false (and records nothing) when no such row exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete or the manifest append fails.
    pub fn remove(&mut self, table: Table, id: &str) -> Result<bool> {
        self.mutate("remove", |tx, ctx| {
            let deleted = tx.execute(
                &format!("DELETE FROM \"{}\" WHERE id = ?1", table.as_str()),
                [id],
            )?;
            if deleted > 0 {
                ctx.record_deletion(table, id);
            }
            Ok(deleted > 0)
        })
    }

    // ====================
    // Index Job Operations
    // ====================

    /// Create a pending job for a repository.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryNotFound` if the repository does not exist.
    pub fn create_job(&mut self, repository_id: &str) -> Result<IndexJob> {
        if self.get_repository(repository_id)?.is_none() {
            return Err(Error::RepositoryNotFound {
                id: repository_id.to_string(),
            });
        }

        let job = IndexJob {
            id: crate::model::new_id(),
            repository_id: repository_id.to_string(),
            status: JobStatus::Pending,
            files_total: 0,
            files_indexed: 0,
            symbols_extracted: 0,
            error: None,
            created_at: now_millis(),
            started_at: None,
            completed_at: None,
        };
        self.mutate("create_job", |tx, _ctx| {
            put_job(tx, &job)?;
            Ok(())
        })?;
        Ok(job)
    }

    /// Mark a pending job as running.
    ///
    /// # Errors
    ///
    /// Returns an error if the job does not exist or is already finished.
    pub fn start_job(&mut self, id: &str) -> Result<()> {
        self.update_live_job(
            id,
            "start_job",
            "UPDATE index_jobs SET status = 'running', started_at = ?2
             WHERE id = ?1 AND status NOT IN ('completed', 'failed')",
            rusqlite::params![id, now_millis()],
        )
    }

    /// Update progress counters of a running job.
    ///
    /// # Errors
    ///
    /// Returns an error if the job does not exist or is already finished.
    pub fn update_job_progress(
        &mut self,
        id: &str,
        files_total: i64,
        files_indexed: i64,
        symbols_extracted: i64,
    ) -> Result<()> {
        self.update_live_job(
            id,
            "update_job_progress",
            "UPDATE index_jobs SET files_total = ?2, files_indexed = ?3, symbols_extracted = ?4
             WHERE id = ?1 AND status NOT IN ('completed', 'failed')",
            rusqlite::params![id, files_total, files_indexed, symbols_extracted],
        )
    }

    /// Mark a job as completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the job does not exist or is already finished.
    pub fn complete_job(&mut self, id: &str) -> Result<()> {
        self.update_live_job(
            id,
            "complete_job",
            "UPDATE index_jobs SET status = 'completed', completed_at = ?2
             WHERE id = ?1 AND status NOT IN ('completed', 'failed')",
            rusqlite::params![id, now_millis()],
        )
    }

    /// Mark a job as failed with an error message.
    ///
    /// # Errors
    ///
    /// Returns an error if the job does not exist or is already finished.
    pub fn fail_job(&mut self, id: &str, error: &str) -> Result<()> {
        self.update_live_job(
            id,
            "fail_job",
            "UPDATE index_jobs SET status = 'failed', error = ?2, completed_at = ?3
             WHERE id = ?1 AND status NOT IN ('completed', 'failed')",
            rusqlite::params![id, error, now_millis()],
        )
    }

    fn update_live_job(
        &mut self,
        id: &str,
        op: &str,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<()> {
        let changed = self.mutate(op, |tx, _ctx| Ok(tx.execute(sql, params)?))?;
        if changed > 0 {
            return Ok(());
        }
        match self.get_job(id)? {
            Some(job) => Err(Error::InvalidArgument(format!(
                "Index job {id} is already {}",
                job.status
            ))),
            None => Err(Error::JobNotFound { id: id.to_string() }),
        }
    }

    /// Get a job by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_job(&self, id: &str) -> Result<Option<IndexJob>> {
        let job = self
            .conn
            .query_row(
                "SELECT id, repository_id, status, files_total, files_indexed, symbols_extracted,
                        error, created_at, started_at, completed_at
                 FROM index_jobs WHERE id = ?1",
                [id],
                map_job,
            )
            .optional()?;
        Ok(job)
    }

    /// List the most recent jobs of a repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_jobs(&self, repository_id: &str, limit: u32) -> Result<Vec<IndexJob>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, repository_id, status, files_total, files_indexed, symbols_extracted,
                    error, created_at, started_at, completed_at
             FROM index_jobs WHERE repository_id = ?1
             ORDER BY created_at DESC, id LIMIT ?2",
        )?;
        let jobs = stmt
            .query_map(rusqlite::params![repository_id, limit], map_job)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }
}

// ==================
// Row writers
// ==================

fn put_repository(tx: &Transaction, repo: &Repository) -> rusqlite::Result<usize> {
    tx.prepare_cached(
        "INSERT INTO repositories (id, name, path, default_branch, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           path = excluded.path,
           default_branch = excluded.default_branch,
           updated_at = excluded.updated_at",
    )?
    .execute(rusqlite::params![
        repo.id,
        repo.name,
        repo.path,
        repo.default_branch,
        repo.created_at,
        repo.updated_at
    ])
}

fn put_file(tx: &Transaction, file: &IndexedFile) -> rusqlite::Result<usize> {
    tx.prepare_cached(
        "INSERT INTO indexed_files (id, repository_id, path, language, content, size, content_hash, indexed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
           repository_id = excluded.repository_id,
           path = excluded.path,
           language = excluded.language,
           content = excluded.content,
           size = excluded.size,
           content_hash = excluded.content_hash,
           indexed_at = excluded.indexed_at",
    )?
    .execute(rusqlite::params![
        file.id,
        file.repository_id,
        file.path,
        file.language,
        file.content,
        file.size,
        file.content_hash,
        file.indexed_at
    ])
}

fn put_symbol(tx: &Transaction, symbol: &Symbol) -> rusqlite::Result<usize> {
    tx.prepare_cached(
        "INSERT INTO symbols (id, file_id, name, kind, start_line, start_column, end_line, end_column, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(id) DO UPDATE SET
           file_id = excluded.file_id,
           name = excluded.name,
           kind = excluded.kind,
           start_line = excluded.start_line,
           start_column = excluded.start_column,
           end_line = excluded.end_line,
           end_column = excluded.end_column,
           metadata = excluded.metadata",
    )?
    .execute(rusqlite::params![
        symbol.id,
        symbol.file_id,
        symbol.name,
        symbol.kind,
        symbol.start_line,
        symbol.start_column,
        symbol.end_line,
        symbol.end_column,
        symbol.metadata
    ])
}

fn put_reference(tx: &Transaction, reference: &Reference) -> rusqlite::Result<usize> {
    tx.prepare_cached(
        "INSERT INTO symbol_references (id, symbol_id, file_id, line_number, column_number, context)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
           symbol_id = excluded.symbol_id,
           file_id = excluded.file_id,
           line_number = excluded.line_number,
           column_number = excluded.column_number,
           context = excluded.context",
    )?
    .execute(rusqlite::params![
        reference.id,
        reference.symbol_id,
        reference.file_id,
        reference.line_number,
        reference.column_number,
        reference.context
    ])
}

fn put_dependency(tx: &Transaction, dep: &Dependency) -> rusqlite::Result<usize> {
    tx.prepare_cached(
        "INSERT INTO dependencies (id, source_file_id, target_file_id, kind, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
           source_file_id = excluded.source_file_id,
           target_file_id = excluded.target_file_id,
           kind = excluded.kind,
           metadata = excluded.metadata",
    )?
    .execute(rusqlite::params![
        dep.id,
        dep.source_file_id,
        dep.target_file_id,
        dep.kind,
        dep.metadata
    ])
}

fn put_job(tx: &Transaction, job: &IndexJob) -> rusqlite::Result<usize> {
    tx.prepare_cached(
        "INSERT INTO index_jobs (id, repository_id, status, files_total, files_indexed,
                                 symbols_extracted, error, created_at, started_at, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(id) DO UPDATE SET
           repository_id = excluded.repository_id,
           status = excluded.status,
           files_total = excluded.files_total,
           files_indexed = excluded.files_indexed,
           symbols_extracted = excluded.symbols_extracted,
           error = excluded.error,
           started_at = excluded.started_at,
           completed_at = excluded.completed_at",
    )?
    .execute(rusqlite::params![
        job.id,
        job.repository_id,
        job.status.as_str(),
        job.files_total,
        job.files_indexed,
        job.symbols_extracted,
        job.error,
        job.created_at,
        job.started_at,
        job.completed_at
    ])
}

// ==================
// Row mappers
// ==================

pub(crate) fn map_repository(row: &Row) -> rusqlite::Result<Repository> {
    Ok(Repository {
        id: row.get(0)?,
        name: row.get(1)?,
        path: row.get(2)?,
        default_branch: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub(crate) fn map_file(row: &Row) -> rusqlite::Result<IndexedFile> {
    Ok(IndexedFile {
        id: row.get(0)?,
        repository_id: row.get(1)?,
        path: row.get(2)?,
        language: row.get(3)?,
        content: row.get(4)?,
        size: row.get(5)?,
        content_hash: row.get(6)?,
        indexed_at: row.get(7)?,
    })
}

pub(crate) fn map_symbol(row: &Row) -> rusqlite::Result<Symbol> {
    Ok(Symbol {
        id: row.get(0)?,
        file_id: row.get(1)?,
        name: row.get(2)?,
        kind: row.get(3)?,
        start_line: row.get(4)?,
        start_column: row.get(5)?,
        end_line: row.get(6)?,
        end_column: row.get(7)?,
        metadata: row.get(8)?,
    })
}

pub(crate) fn map_reference(row: &Row) -> rusqlite::Result<Reference> {
    Ok(Reference {
        id: row.get(0)?,
        symbol_id: row.get(1)?,
        file_id: row.get(2)?,
        line_number: row.get(3)?,
        column_number: row.get(4)?,
        context: row.get(5)?,
    })
}

fn map_job(row: &Row) -> rusqlite::Result<IndexJob> {
    let status: String = row.get(2)?;
    let status = status.parse::<JobStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(IndexJob {
        id: row.get(0)?,
        repository_id: row.get(1)?,
        status,
        files_total: row.get(3)?,
        files_indexed: row.get(4)?,
        symbols_extracted: row.get(5)?,
        error: row.get(6)?,
        created_at: row.get(7)?,
        started_at: row.get(8)?,
        completed_at: row.get(9)?,
    })
}
