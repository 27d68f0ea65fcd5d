//! Read-side queries: full-text search, recent files, graph traversal and
//! symbol lookup.

use rusqlite::OptionalExtension;

use crate::error::Result;
use crate::model::{DependencyNode, FileSearchResult, IndexedFile, Reference, Symbol};
use crate::storage::sqlite::{map_file, map_reference, map_symbol, SqliteStorage};

/// Traversal depth used when the caller does not pass one.
pub const DEFAULT_MAX_DEPTH: u32 = 10;

/// Snippet window in tokens.
const SNIPPET_TOKENS: i32 = 32;

/// Turn arbitrary user input into a safe FTS5 query.
///
/// Each whitespace-separated token becomes a quoted string (inner quotes
/// doubled), so operators like `AND`, `NEAR`, `*`, `-` or `(` are matched
/// literally. Tokens without any letter or digit cannot produce index terms
/// and are dropped. Returns `None` when nothing searchable remains.
#[must_use]
pub fn escape_fts_query(term: &str) -> Option<String> {
    let tokens: Vec<String> = term
        .split_whitespace()
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();

    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" "))
    }
}

impl SqliteStorage {
    /// Ranked full-text search over file paths and content.
    ///
    /// Matches are ordered by bm25 (best first) and carry a snippet with
    /// matched terms wrapped in `<mark>`…`</mark>`, truncated with `...`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn search(&self, term: &str, limit: u32) -> Result<Vec<FileSearchResult>> {
        let Some(query) = escape_fts_query(term) else {
            return Ok(Vec::new());
        };

        let mut stmt = self.conn().prepare_cached(
            "SELECT f.id, f.repository_id, f.path,
                    snippet(indexed_files_fts, 2, '<mark>', '</mark>', '...', ?3) AS snippet,
                    bm25(indexed_files_fts) AS score,
                    f.indexed_at
             FROM indexed_files_fts
             JOIN indexed_files f ON f.id = indexed_files_fts.file_id
             WHERE indexed_files_fts MATCH ?1
             ORDER BY score, f.path
             LIMIT ?2",
        )?;

        let results = stmt
            .query_map(rusqlite::params![query, limit, SNIPPET_TOKENS], |row| {
                Ok(FileSearchResult {
                    file_id: row.get(0)?,
                    repository_id: row.get(1)?,
                    path: row.get(2)?,
                    snippet: row.get(3)?,
                    rank: row.get(4)?,
                    indexed_at: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(results)
    }

    /// Most recently indexed files, newest first.
    ///
    /// The repository filter only narrows the rows; ordering and limit are
    /// the same with or without it.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_recent(&self, limit: u32, repository_id: Option<&str>) -> Result<Vec<IndexedFile>> {
        let mut stmt = self.conn().prepare_cached(
            "SELECT id, repository_id, path, language, content, size, content_hash, indexed_at
             FROM indexed_files
             WHERE (?1 IS NULL OR repository_id = ?1)
             ORDER BY indexed_at DESC, id
             LIMIT ?2",
        )?;
        let files = stmt
            .query_map(rusqlite::params![repository_id, limit], map_file)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(files)
    }

    /// Files that (transitively) depend on `file_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn dependents(&self, file_id: &str, max_depth: Option<u32>) -> Result<Vec<DependencyNode>> {
        self.traverse(file_id, max_depth, Direction::Dependents)
    }

    /// Files that `file_id` (transitively) depends on.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn dependencies(
        &self,
        file_id: &str,
        max_depth: Option<u32>,
    ) -> Result<Vec<DependencyNode>> {
        self.traverse(file_id, max_depth, Direction::Dependencies)
    }

    /// Recursive walk over dependency edges.
    ///
    /// Level 1 holds the immediate neighbours and each recursive step adds
    /// one level, stopping at `max_depth`. `UNION` drops repeated
    /// (file, level) pairs so cycles cannot grow the working set beyond
    /// nodes x depth; grouping keeps each file once at its shallowest level.
    /// The start file itself is never reported, even when a cycle leads back.
    fn traverse(
        &self,
        file_id: &str,
        max_depth: Option<u32>,
        direction: Direction,
    ) -> Result<Vec<DependencyNode>> {
        let max_depth = max_depth.unwrap_or(DEFAULT_MAX_DEPTH);
        if max_depth == 0 {
            return Ok(Vec::new());
        }

        let (from, to) = direction.columns();
        let sql = format!(
            "WITH RECURSIVE reach(file_id, level) AS (
                 SELECT {to}, 1 FROM dependencies WHERE {from} = ?1
                 UNION
                 SELECT d.{to}, r.level + 1
                 FROM dependencies d
                 JOIN reach r ON d.{from} = r.file_id
                 WHERE r.level < ?2
             )
             SELECT f.id, f.repository_id, f.path, MIN(r.level) AS min_level
             FROM reach r
             JOIN indexed_files f ON f.id = r.file_id
             WHERE r.file_id != ?1
             GROUP BY f.id
             ORDER BY min_level, f.path"
        );

        let mut stmt = self.conn().prepare_cached(&sql)?;
        let nodes = stmt
            .query_map(rusqlite::params![file_id, max_depth], |row| {
                Ok(DependencyNode {
                    file_id: row.get(0)?,
                    repository_id: row.get(1)?,
                    path: row.get(2)?,
                    level: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(nodes)
    }

    /// Resolve a repository-relative path to a file id.
    ///
    /// A missing file is `Ok(None)`, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn resolve_path(&self, repository_id: &str, path: &str) -> Result<Option<String>> {
        let id = self
            .conn()
            .query_row(
                "SELECT id FROM indexed_files WHERE repository_id = ?1 AND path = ?2",
                [repository_id, path],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Symbols with an exact name, optionally narrowed to one kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn find_symbols(&self, name: &str, kind: Option<&str>) -> Result<Vec<Symbol>> {
        let mut stmt = self.conn().prepare_cached(
            "SELECT id, file_id, name, kind, start_line, start_column, end_line, end_column, metadata
             FROM symbols
             WHERE name = ?1 AND (?2 IS NULL OR kind = ?2)
             ORDER BY file_id, start_line, id",
        )?;
        let symbols = stmt
            .query_map(rusqlite::params![name, kind], map_symbol)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(symbols)
    }

    /// Use-sites of a symbol in file and line order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn references_of(&self, symbol_id: &str) -> Result<Vec<Reference>> {
        let mut stmt = self.conn().prepare_cached(
            "SELECT id, symbol_id, file_id, line_number, column_number, context
             FROM symbol_references
             WHERE symbol_id = ?1
             ORDER BY file_id, line_number, column_number",
        )?;
        let refs = stmt
            .query_map([symbol_id], map_reference)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(refs)
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Dependents,
    Dependencies,
}

impl Direction {
    /// (column matched against the frontier, column that is the next hop)
    const fn columns(self) -> (&'static str, &'static str) {
        match self {
            Self::Dependencies => ("source_file_id", "target_file_id"),
            Self::Dependents => ("target_file_id", "source_file_id"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Dependency, Repository};

    struct Fixture {
        storage: SqliteStorage,
        repo: Repository,
    }

    impl Fixture {
        fn new() -> Self {
            let mut storage = SqliteStorage::open_memory().unwrap();
            let repo = Repository::new("demo", None);
            storage.upsert_repository(&repo).unwrap();
            Self { storage, repo }
        }

        fn file(&mut self, path: &str, content: &str) -> IndexedFile {
            let file = IndexedFile::new(&self.repo.id, path, content);
            self.storage.upsert_files(std::slice::from_ref(&file)).unwrap();
            file
        }

        fn edge(&mut self, from: &IndexedFile, to: &IndexedFile) {
            self.storage
                .upsert_dependencies(&[Dependency::new(&from.id, &to.id, "file_import")])
                .unwrap();
        }
    }

    fn paths(nodes: &[DependencyNode]) -> Vec<(&str, i64)> {
        nodes.iter().map(|n| (n.path.as_str(), n.level)).collect()
    }

    #[test]
    fn test_escape_fts_query() {
        assert_eq!(escape_fts_query("hello world").as_deref(), Some("\"hello\" \"world\""));
        assert_eq!(escape_fts_query("say \"hi\"").as_deref(), Some("\"say\" \"\"\"hi\"\"\""));
        assert_eq!(escape_fts_query("   "), None);
        assert_eq!(escape_fts_query("( ) * -"), None);
    }

    #[test]
    fn test_search_ranks_and_highlights() {
        let mut fx = Fixture::new();
        fx.file("src/auth.ts", "export function authenticate(user) { return token; }");
        fx.file("src/util.ts", "export const pad = (s) => s;");

        let results = fx.storage.search("authenticate", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "src/auth.ts");
        assert!(results[0].snippet.contains("<mark>authenticate</mark>"));
    }

    #[test]
    fn test_search_snippet_is_bounded_and_truncated() {
        let mut fx = Fixture::new();
        let words: Vec<String> = (0..200)
            .map(|i| if i == 100 { "needle".to_string() } else { format!("filler{i}") })
            .collect();
        let content = words.join(" ");
        fx.file("src/long.ts", &content);

        let results = fx.storage.search("needle", 10).unwrap();
        assert_eq!(results.len(), 1);
        let snippet = &results[0].snippet;
        assert!(snippet.contains("<mark>needle</mark>"), "{snippet}");
        assert!(snippet.starts_with("..."), "{snippet}");
        assert!(snippet.ends_with("..."), "{snippet}");
        assert!(!snippet.contains("filler0 "), "{snippet}");
        assert!(!snippet.contains("filler199"), "{snippet}");
        let max_words = usize::try_from(SNIPPET_TOKENS).unwrap();
        assert!(snippet.split_whitespace().count() <= max_words, "{snippet}");
        assert!(snippet.len() < content.len());
    }

    #[test]
    fn test_search_tolerates_operator_input() {
        let mut fx = Fixture::new();
        fx.file("a.ts", "function NEAR(x) { return x * 2; }");

        for input in ["NEAR(", "x * 2", "\"unterminated", "AND OR NOT", "-", ""] {
            assert!(fx.storage.search(input, 10).is_ok(), "query {input:?} errored");
        }
        assert_eq!(fx.storage.search("NEAR(", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_search_respects_limit() {
        let mut fx = Fixture::new();
        for i in 0..5 {
            fx.file(&format!("f{i}.ts"), "shared term");
        }
        assert_eq!(fx.storage.search("shared", 3).unwrap().len(), 3);
    }

    #[test]
    fn test_list_recent_filter_keeps_ordering() {
        let mut fx = Fixture::new();
        let other = Repository::new("other", None);
        fx.storage.upsert_repository(&other).unwrap();

        let mut rows = Vec::new();
        for (i, repo_id) in [&fx.repo.id, &other.id, &fx.repo.id].into_iter().enumerate() {
            let mut f = IndexedFile::new(repo_id, &format!("f{i}.ts"), "x");
            f.indexed_at = 1_000 + i64::try_from(i).unwrap();
            rows.push(f);
        }
        fx.storage.upsert_files(&rows).unwrap();

        let all = fx.storage.list_recent(10, None).unwrap();
        assert_eq!(
            all.iter().map(|f| f.path.as_str()).collect::<Vec<_>>(),
            vec!["f2.ts", "f1.ts", "f0.ts"]
        );

        let filtered = fx.storage.list_recent(10, Some(&fx.repo.id)).unwrap();
        assert_eq!(
            filtered.iter().map(|f| f.path.as_str()).collect::<Vec<_>>(),
            vec!["f2.ts", "f0.ts"]
        );

        assert_eq!(fx.storage.list_recent(1, None).unwrap()[0].path, "f2.ts");
    }

    #[test]
    fn test_traversal_levels_and_order() {
        let mut fx = Fixture::new();
        let a = fx.file("a.ts", "");
        let b = fx.file("b.ts", "");
        let c = fx.file("c.ts", "");
        let d = fx.file("d.ts", "");
        // a -> c, a -> b, b -> d
        fx.edge(&a, &c);
        fx.edge(&a, &b);
        fx.edge(&b, &d);

        let deps = fx.storage.dependencies(&a.id, None).unwrap();
        assert_eq!(paths(&deps), vec![("b.ts", 1), ("c.ts", 1), ("d.ts", 2)]);

        let limited = fx.storage.dependencies(&a.id, Some(1)).unwrap();
        assert_eq!(paths(&limited), vec![("b.ts", 1), ("c.ts", 1)]);

        let dependents = fx.storage.dependents(&d.id, None).unwrap();
        assert_eq!(paths(&dependents), vec![("b.ts", 1), ("a.ts", 2)]);
    }

    #[test]
    fn test_diamond_returns_each_node_once() {
        let mut fx = Fixture::new();
        let top = fx.file("top.ts", "");
        let left = fx.file("left.ts", "");
        let right = fx.file("right.ts", "");
        let bottom = fx.file("bottom.ts", "");
        fx.edge(&top, &left);
        fx.edge(&top, &right);
        fx.edge(&left, &bottom);
        fx.edge(&right, &bottom);

        let deps = fx.storage.dependencies(&top.id, None).unwrap();
        assert_eq!(
            paths(&deps),
            vec![("left.ts", 1), ("right.ts", 1), ("bottom.ts", 2)]
        );
    }

    #[test]
    fn test_cycle_terminates_and_excludes_start() {
        let mut fx = Fixture::new();
        let a = fx.file("a.ts", "");
        let b = fx.file("b.ts", "");
        let c = fx.file("c.ts", "");
        fx.edge(&a, &b);
        fx.edge(&b, &c);
        fx.edge(&c, &a);

        let deps = fx.storage.dependencies(&a.id, Some(50)).unwrap();
        assert_eq!(paths(&deps), vec![("b.ts", 1), ("c.ts", 2)]);

        let dependents = fx.storage.dependents(&a.id, None).unwrap();
        assert_eq!(paths(&dependents), vec![("c.ts", 1), ("b.ts", 2)]);
    }

    #[test]
    fn test_self_loop_and_zero_depth() {
        let mut fx = Fixture::new();
        let a = fx.file("a.ts", "");
        fx.edge(&a, &a);

        assert!(fx.storage.dependencies(&a.id, None).unwrap().is_empty());
        assert!(fx.storage.dependencies(&a.id, Some(0)).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_path() {
        let mut fx = Fixture::new();
        let file = fx.file("src/index.ts", "");

        assert_eq!(
            fx.storage.resolve_path(&fx.repo.id, "src/index.ts").unwrap(),
            Some(file.id)
        );
        assert_eq!(fx.storage.resolve_path(&fx.repo.id, "src/missing.ts").unwrap(), None);
    }

    #[test]
    fn test_symbols_and_references() {
        let mut fx = Fixture::new();
        let def = fx.file("lib.ts", "export function parse() {}");
        let user = fx.file("main.ts", "parse();");

        let func = Symbol::new(&def.id, "parse", "function", 1, 1);
        let var = Symbol::new(&user.id, "parse", "variable", 3, 3);
        fx.storage.upsert_symbols(&[func.clone(), var]).unwrap();

        let mut reference = Reference::new(&func.id, &user.id, 1, 0);
        reference.context = Some("parse();".into());
        fx.storage.upsert_references(std::slice::from_ref(&reference)).unwrap();

        assert_eq!(fx.storage.find_symbols("parse", None).unwrap().len(), 2);
        let functions = fx.storage.find_symbols("parse", Some("function")).unwrap();
        assert_eq!(functions, vec![func.clone()]);

        assert_eq!(fx.storage.references_of(&func.id).unwrap(), vec![reference]);
    }
}
