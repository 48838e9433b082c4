//! Code snippet store

use super::Database;
use crate::error::Result;
use crate::refresh::IndexTag;
use chrono::Utc;
use rusqlite::params;
use serde::Serialize;

/// A structural unit recorded for a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeSnippet {
    pub kind: String,
    pub title: String,
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl Database {
    /// Replace the snippets of `path` under `tag`
    pub fn replace_snippets(
        &self,
        tag: &IndexTag,
        path: &str,
        cache_key: &str,
        snippets: &[CodeSnippet],
    ) -> Result<()> {
        let tag = tag.to_string();
        let now = Utc::now().to_rfc3339();

        self.in_transaction(|| {
            self.conn.execute(
                "DELETE FROM code_snippets WHERE tag = ?1 AND path = ?2",
                params![tag, path],
            )?;

            let mut stmt = self.conn.prepare_cached(
                "INSERT INTO code_snippets (tag, path, cache_key, kind, title, content,
                                            start_line, end_line, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for snippet in snippets {
                stmt.execute(params![
                    tag,
                    path,
                    cache_key,
                    snippet.kind,
                    snippet.title,
                    snippet.content,
                    snippet.start_line as i64,
                    snippet.end_line as i64,
                    now
                ])?;
            }
            Ok(())
        })
    }

    pub fn delete_snippets(&self, tag: &IndexTag, path: &str) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM code_snippets WHERE tag = ?1 AND path = ?2",
            params![tag.to_string(), path],
        )?;
        Ok(rows)
    }

    /// Snippets of `path` under `tag`, in source order
    pub fn get_snippets(&self, tag: &IndexTag, path: &str) -> Result<Vec<CodeSnippet>> {
        let mut stmt = self.conn.prepare(
            "SELECT kind, title, content, start_line, end_line FROM code_snippets
             WHERE tag = ?1 AND path = ?2
             ORDER BY start_line, id",
        )?;

        let snippets = stmt
            .query_map(params![tag.to_string(), path], |row| {
                Ok(CodeSnippet {
                    kind: row.get(0)?,
                    title: row.get(1)?,
                    content: row.get(2)?,
                    start_line: row.get::<_, i64>(3)? as usize,
                    end_line: row.get::<_, i64>(4)? as usize,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(snippets)
    }

    pub fn count_snippets(&self, tag: &IndexTag) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM code_snippets WHERE tag = ?1",
            params![tag.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_and_delete() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let tag = IndexTag::new("/w", "main", "codeSnippets");
        let snippet = CodeSnippet {
            kind: "function".to_string(),
            title: "main".to_string(),
            content: "fn main() {}".to_string(),
            start_line: 1,
            end_line: 1,
        };

        db.replace_snippets(&tag, "/w/main.rs", "k", &[snippet.clone()])
            .unwrap();
        db.replace_snippets(&tag, "/w/main.rs", "k", &[snippet.clone()])
            .unwrap();
        assert_eq!(db.get_snippets(&tag, "/w/main.rs").unwrap(), vec![snippet]);

        assert_eq!(db.delete_snippets(&tag, "/w/main.rs").unwrap(), 1);
        assert_eq!(db.count_snippets(&tag).unwrap(), 0);
    }
}
