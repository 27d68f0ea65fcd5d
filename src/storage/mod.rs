//! SQLite storage layer for KotaDB.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode for concurrent reads
//! - Immediate transactions for atomic batch writes
//! - FTS5 full-text index kept in sync by triggers
//! - Tombstone recording for removes
//!
//! # Submodules
//!
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Connection lifecycle and write operations
//! - [`query`] - Search, recent files, graph traversal
//! - [`rows`] - Table-agnostic row codec used by sync

pub mod query;
pub mod rows;
pub mod schema;
pub mod sqlite;

pub use query::{escape_fts_query, DEFAULT_MAX_DEPTH};
pub use sqlite::{MutationContext, SqliteStorage, WriteBatch};
