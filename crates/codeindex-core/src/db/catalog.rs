//! Tag catalog: the committed baseline of every (directory, branch, artifact)
//!
//! `tag_dirty` lists the files whose store rows were written after the
//! baseline was last committed. Those rows no longer match the baseline, so
//! the next diff must not trust the baseline for them.

use super::Database;
use crate::error::Result;
use crate::refresh::{IndexTag, PathAndCacheKey};
use rusqlite::params;
use std::collections::BTreeMap;

/// One file of a committed baseline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub path: String,
    pub cache_key: String,
    pub last_modified: i64,
    pub size: u64,
}

impl Database {
    /// Committed baseline for a tag, keyed by path
    pub fn catalog_entries(&self, tag: &IndexTag) -> Result<BTreeMap<String, CatalogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, cache_key, last_modified, size FROM tag_catalog
             WHERE dir = ?1 AND branch = ?2 AND artifact_id = ?3",
        )?;

        let entries = stmt
            .query_map(
                params![tag.directory, tag.branch, tag.artifact_id],
                |row| {
                    Ok(CatalogEntry {
                        path: row.get(0)?,
                        cache_key: row.get(1)?,
                        last_modified: row.get(2)?,
                        size: row.get::<_, i64>(3)? as u64,
                    })
                },
            )?
            .map(|r| r.map(|e| (e.path.clone(), e)))
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;

        Ok(entries)
    }

    pub(crate) fn upsert_catalog_entry(&self, tag: &IndexTag, entry: &CatalogEntry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO tag_catalog (dir, branch, artifact_id, path, cache_key, last_modified, size)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(dir, branch, artifact_id, path) DO UPDATE SET
                cache_key = excluded.cache_key,
                last_modified = excluded.last_modified,
                size = excluded.size",
            params![
                tag.directory,
                tag.branch,
                tag.artifact_id,
                entry.path,
                entry.cache_key,
                entry.last_modified,
                entry.size as i64
            ],
        )?;
        Ok(())
    }

    pub(crate) fn delete_catalog_entry(&self, tag: &IndexTag, path: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM tag_catalog
             WHERE dir = ?1 AND branch = ?2 AND artifact_id = ?3 AND path = ?4",
            params![tag.directory, tag.branch, tag.artifact_id, path],
        )?;
        Ok(())
    }

    /// Record that the store of `tag` is about to change for `file`
    pub(crate) fn mark_dirty(&self, tag: &IndexTag, file: &PathAndCacheKey) -> Result<()> {
        self.conn.execute(
            "INSERT INTO tag_dirty (dir, branch, artifact_id, path, cache_key)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(dir, branch, artifact_id, path) DO UPDATE SET
                cache_key = excluded.cache_key",
            params![
                tag.directory,
                tag.branch,
                tag.artifact_id,
                file.path,
                file.cache_key
            ],
        )?;
        Ok(())
    }

    /// Files touched by an update of `tag` that never committed, with the
    /// cache key they were last written under
    pub fn dirty_entries(&self, tag: &IndexTag) -> Result<BTreeMap<String, String>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, cache_key FROM tag_dirty
             WHERE dir = ?1 AND branch = ?2 AND artifact_id = ?3",
        )?;

        let entries = stmt
            .query_map(
                params![tag.directory, tag.branch, tag.artifact_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;

        Ok(entries)
    }

    pub(crate) fn clear_dirty(&self, tag: &IndexTag) -> Result<()> {
        self.conn.execute(
            "DELETE FROM tag_dirty WHERE dir = ?1 AND branch = ?2 AND artifact_id = ?3",
            params![tag.directory, tag.branch, tag.artifact_id],
        )?;
        Ok(())
    }

    /// Number of files in a tag's baseline
    pub fn catalog_file_count(&self, tag: &IndexTag) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tag_catalog WHERE dir = ?1 AND branch = ?2 AND artifact_id = ?3",
            params![tag.directory, tag.branch, tag.artifact_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Every tag with a committed baseline, optionally restricted to one directory
    pub fn catalog_tags(&self, directory: Option<&str>) -> Result<Vec<(IndexTag, usize)>> {
        let mut stmt = self.conn.prepare(
            "SELECT dir, branch, artifact_id, COUNT(*) FROM tag_catalog
             WHERE ?1 IS NULL OR dir = ?1
             GROUP BY dir, branch, artifact_id
             ORDER BY dir, branch, artifact_id",
        )?;

        let tags = stmt
            .query_map(params![directory], |row| {
                Ok((
                    IndexTag::new(
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ),
                    row.get::<_, i64>(3)? as usize,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(tags)
    }
}
