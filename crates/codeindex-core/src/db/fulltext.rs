//! Full-text store (FTS5)
//!
//! `fts` holds the searchable text; `fts_metadata` shares its rowid and
//! records which tag and content version each row belongs to.

use super::Database;
use crate::error::Result;
use crate::refresh::IndexTag;
use rusqlite::{params, OptionalExtension};

impl Database {
    /// Index `content` for `path` under `tag`, replacing any previous version
    pub fn upsert_full_text(
        &self,
        tag: &IndexTag,
        path: &str,
        cache_key: &str,
        content: &str,
    ) -> Result<()> {
        let tag = tag.to_string();

        self.in_transaction(|| {
            self.delete_full_text_rows(&tag, path)?;

            self.conn.execute(
                "INSERT INTO fts (path, content) VALUES (?1, ?2)",
                params![path, content],
            )?;
            let rowid = self.conn.last_insert_rowid();
            self.conn.execute(
                "INSERT INTO fts_metadata (id, tag, path, cache_key) VALUES (?1, ?2, ?3, ?4)",
                params![rowid, tag, path, cache_key],
            )?;
            Ok(())
        })
    }

    /// Remove the entry for `path` under `tag`
    pub fn delete_full_text(&self, tag: &IndexTag, path: &str) -> Result<usize> {
        let tag = tag.to_string();
        self.in_transaction(|| self.delete_full_text_rows(&tag, path))
    }

    fn delete_full_text_rows(&self, tag: &str, path: &str) -> Result<usize> {
        let rowid: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM fts_metadata WHERE tag = ?1 AND path = ?2",
                params![tag, path],
                |row| row.get(0),
            )
            .optional()?;

        let Some(rowid) = rowid else {
            return Ok(0);
        };

        self.conn
            .execute("DELETE FROM fts WHERE rowid = ?1", params![rowid])?;
        self.conn
            .execute("DELETE FROM fts_metadata WHERE id = ?1", params![rowid])?;
        Ok(1)
    }

    /// Content version indexed for `path` under `tag`, if any
    pub fn full_text_cache_key(&self, tag: &IndexTag, path: &str) -> Result<Option<String>> {
        let key = self
            .conn
            .query_row(
                "SELECT cache_key FROM fts_metadata WHERE tag = ?1 AND path = ?2",
                params![tag.to_string(), path],
                |row| row.get(0),
            )
            .optional()?;
        Ok(key)
    }

    /// Paths under `tag` whose content matches an FTS5 query, best match first
    pub fn search_full_text(&self, tag: &IndexTag, query: &str, limit: usize) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT m.path FROM fts
             JOIN fts_metadata m ON m.id = fts.rowid
             WHERE fts MATCH ?1 AND m.tag = ?2
             ORDER BY bm25(fts)
             LIMIT ?3",
        )?;

        let paths = stmt
            .query_map(params![query, tag.to_string(), limit as i64], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(paths)
    }

    /// Number of full-text entries under `tag`
    pub fn count_full_text(&self, tag: &IndexTag) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM fts_metadata WHERE tag = ?1",
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
    fn test_upsert_replaces_previous_content() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let tag = IndexTag::new("/w", "main", "sqliteFts");

        db.upsert_full_text(&tag, "/w/a.py", "k1", "def parse_config(): pass")
            .unwrap();
        assert_eq!(db.search_full_text(&tag, "parse_config", 10).unwrap(), vec!["/w/a.py"]);

        db.upsert_full_text(&tag, "/w/a.py", "k2", "def load_settings(): pass")
            .unwrap();
        assert_eq!(db.count_full_text(&tag).unwrap(), 1);
        assert!(db.search_full_text(&tag, "parse_config", 10).unwrap().is_empty());
        assert_eq!(
            db.full_text_cache_key(&tag, "/w/a.py").unwrap().as_deref(),
            Some("k2")
        );
        assert_eq!(db.search_full_text(&tag, "load_settings", 10).unwrap(), vec!["/w/a.py"]);
    }

    #[test]
    fn test_search_is_scoped_to_tag() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let main = IndexTag::new("/w", "main", "sqliteFts");
        let dev = IndexTag::new("/w", "dev", "sqliteFts");

        db.upsert_full_text(&main, "/w/a.rs", "k", "tokenizer").unwrap();
        db.upsert_full_text(&dev, "/w/a.rs", "k", "tokenizer").unwrap();

        assert_eq!(db.delete_full_text(&main, "/w/a.rs").unwrap(), 1);
        assert_eq!(db.delete_full_text(&main, "/w/a.rs").unwrap(), 0);
        assert!(db.search_full_text(&main, "tokenizer", 10).unwrap().is_empty());
        assert_eq!(db.search_full_text(&dev, "tokenizer", 10).unwrap().len(), 1);
    }
}
