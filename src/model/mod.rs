//! Data models for KotaDB.
//!
//! This module contains the indexed entities:
//! - Repository
//! - IndexedFile
//! - Symbol / Reference
//! - Dependency
//! - IndexJob
//!
//! Timestamps are stored as Unix milliseconds.

pub mod dependency;
pub mod file;
pub mod job;
pub mod metadata;
pub mod symbol;

pub use dependency::{Dependency, DependencyNode};
pub use file::{FileSearchResult, IndexedFile, Repository};
pub use job::{IndexJob, JobStatus};
pub use metadata::Metadata;
pub use symbol::{Reference, Symbol};

/// Current time as Unix milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a new random row id.
#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
