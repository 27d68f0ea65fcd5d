//! Repository and indexed file models.

use serde::{Deserialize, Serialize};

use crate::sync::content_hash_str;

/// Root of an indexed project. Owns its files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Stable unique key.
    pub id: String,
    /// Display name (usually `owner/repo` or the directory name).
    pub name: String,
    /// Local checkout path, if known.
    pub path: Option<String>,
    /// Default branch name.
    pub default_branch: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Repository {
    /// Create a repository with a fresh id and current timestamps.
    #[must_use]
    pub fn new(name: impl Into<String>, path: Option<String>) -> Self {
        let now = super::now_millis();
        Self {
            id: super::new_id(),
            name: name.into(),
            path,
            default_branch: Some("main".to_string()),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One source file captured by the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedFile {
    pub id: String,
    pub repository_id: String,
    /// Path relative to the repository root.
    pub path: String,
    pub language: Option<String>,
    pub content: String,
    /// Content length in bytes.
    pub size: i64,
    /// SHA256 of `content`.
    pub content_hash: String,
    pub indexed_at: i64,
}

impl IndexedFile {
    /// Build a file row, deriving size and hash from the content.
    #[must_use]
    pub fn new(repository_id: &str, path: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: file_id(repository_id, path),
            repository_id: repository_id.to_string(),
            path: path.to_string(),
            language: language_for_path(path).map(String::from),
            size: i64::try_from(content.len()).unwrap_or(i64::MAX),
            content_hash: content_hash_str(&content),
            content,
            indexed_at: super::now_millis(),
        }
    }
}

/// Deterministic file id so two machines indexing the same path agree.
#[must_use]
pub fn file_id(repository_id: &str, path: &str) -> String {
    content_hash_str(&format!("{repository_id}:{path}"))[..32].to_string()
}

/// A full-text match over file content.
#[derive(Debug, Clone, Serialize)]
pub struct FileSearchResult {
    pub file_id: String,
    pub repository_id: String,
    pub path: String,
    /// Highlighted excerpt; matches wrapped in `<mark>`…`</mark>`.
    pub snippet: String,
    /// bm25 rank (lower is better).
    pub rank: f64,
    pub indexed_at: i64,
}

/// Guess a language tag from the file extension.
#[must_use]
pub fn language_for_path(path: &str) -> Option<&'static str> {
    let ext = std::path::Path::new(path).extension()?.to_str()?;
    Some(match ext {
        "rs" => "rust",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "py" => "python",
        "go" => "go",
        "java" => "java",
        "rb" => "ruby",
        "c" | "h" => "c",
        "cc" | "cpp" | "hpp" => "cpp",
        "md" => "markdown",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_file_derives_hash_and_size() {
        let file = IndexedFile::new("repo-1", "src/lib.ts", "export const a = 1;");
        assert_eq!(file.size, 19);
        assert_eq!(file.content_hash.len(), 64);
        assert_eq!(file.language.as_deref(), Some("typescript"));
    }

    #[test]
    fn test_file_id_is_stable_per_path() {
        let a = IndexedFile::new("repo-1", "src/a.ts", "one");
        let b = IndexedFile::new("repo-1", "src/a.ts", "two");
        let c = IndexedFile::new("repo-2", "src/a.ts", "one");
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_language_unknown_extension() {
        assert_eq!(language_for_path("Makefile"), None);
        assert_eq!(language_for_path("a.xyz"), None);
    }
}
