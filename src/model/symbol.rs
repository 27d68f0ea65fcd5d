//! Symbol definitions and their use-sites.

use serde::{Deserialize, Serialize};

use super::Metadata;

/// A named definition extracted from a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: String,
    pub file_id: String,
    pub name: String,
    /// function, class, interface, variable, ...
    pub kind: String,
    pub start_line: i64,
    pub start_column: i64,
    pub end_line: i64,
    pub end_column: i64,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Symbol {
    /// Create a symbol spanning the given lines (columns start at zero).
    #[must_use]
    pub fn new(file_id: &str, name: &str, kind: &str, start_line: i64, end_line: i64) -> Self {
        Self {
            id: super::new_id(),
            file_id: file_id.to_string(),
            name: name.to_string(),
            kind: kind.to_string(),
            start_line,
            start_column: 0,
            end_line,
            end_column: 0,
            metadata: Metadata::default(),
        }
    }
}

/// A use-site of a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    pub symbol_id: String,
    /// File containing the use-site (may differ from the symbol's file).
    pub file_id: String,
    pub line_number: i64,
    pub column_number: i64,
    /// Source line around the use-site.
    pub context: Option<String>,
}

impl Reference {
    #[must_use]
    pub fn new(symbol_id: &str, file_id: &str, line_number: i64, column_number: i64) -> Self {
        Self {
            id: super::new_id(),
            symbol_id: symbol_id.to_string(),
            file_id: file_id.to_string(),
            line_number,
            column_number,
            context: None,
        }
    }
}
