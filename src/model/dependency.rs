//! Directed edges of the file dependency graph.
//!
//! Cycles and diamonds are normal in real code bases; nothing here rejects
//! them. Traversals in `storage::query` bound depth and deduplicate.

use serde::{Deserialize, Serialize};

use super::Metadata;

/// `source_file_id` depends on `target_file_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: String,
    pub source_file_id: String,
    pub target_file_id: String,
    /// Edge kind, e.g. `file_import`.
    pub kind: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Dependency {
    #[must_use]
    pub fn new(source_file_id: &str, target_file_id: &str, kind: &str) -> Self {
        Self {
            id: super::new_id(),
            source_file_id: source_file_id.to_string(),
            target_file_id: target_file_id.to_string(),
            kind: kind.to_string(),
            metadata: Metadata::default(),
        }
    }
}

/// A file reached by a dependents/dependencies traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyNode {
    pub file_id: String,
    pub repository_id: String,
    pub path: String,
    /// Distance from the start file; immediate neighbours are level 1.
    pub level: i64,
}
