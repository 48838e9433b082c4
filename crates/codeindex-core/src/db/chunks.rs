//! Chunk store
//!
//! Rows are keyed by `(tag, path, seq)`. Writing a file's chunks replaces
//! whatever the tag held for that path, so re-adding a file is idempotent.

use super::Database;
use crate::error::Result;
use crate::index::{ChunkType, CodeChunk};
use crate::refresh::IndexTag;
use chrono::Utc;
use rusqlite::params;
use serde::Serialize;

/// A chunk as persisted for one file of a tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredChunk {
    pub path: String,
    pub cache_key: String,
    pub seq: usize,
    pub chunk: CodeChunk,
}

impl Database {
    /// Replace the chunks of `path` under `tag`
    pub fn replace_chunks(
        &self,
        tag: &IndexTag,
        path: &str,
        cache_key: &str,
        chunks: &[CodeChunk],
    ) -> Result<()> {
        let tag = tag.to_string();
        let now = Utc::now().to_rfc3339();

        self.in_transaction(|| {
            self.conn.execute(
                "DELETE FROM chunks WHERE tag = ?1 AND path = ?2",
                params![tag, path],
            )?;

            let mut stmt = self.conn.prepare_cached(
                "INSERT INTO chunks (tag, path, cache_key, seq, chunk_type, breadcrumb,
                                     start_line, end_line, content, chunk_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for (seq, chunk) in chunks.iter().enumerate() {
                stmt.execute(params![
                    tag,
                    path,
                    cache_key,
                    seq as i64,
                    chunk.chunk_type.as_str(),
                    chunk.breadcrumb,
                    chunk.start_line as i64,
                    chunk.end_line as i64,
                    chunk.content,
                    chunk.chunk_hash,
                    now
                ])?;
            }
            Ok(())
        })
    }

    /// Remove every chunk of `path` under `tag`
    pub fn delete_chunks(&self, tag: &IndexTag, path: &str) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM chunks WHERE tag = ?1 AND path = ?2",
            params![tag.to_string(), path],
        )?;
        Ok(rows)
    }

    /// Chunks stored for `path` at a specific content version, in order
    pub fn get_chunks(
        &self,
        tag: &IndexTag,
        path: &str,
        cache_key: &str,
    ) -> Result<Vec<StoredChunk>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, cache_key, seq, chunk_type, breadcrumb, start_line, end_line,
                    content, chunk_hash
             FROM chunks
             WHERE tag = ?1 AND path = ?2 AND cache_key = ?3
             ORDER BY seq",
        )?;

        let rows = stmt
            .query_map(params![tag.to_string(), path, cache_key], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, String>(8)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(path, cache_key, seq, kind, breadcrumb, start_line, end_line, content, hash)|
                 -> Result<StoredChunk> {
                    Ok(StoredChunk {
                        path,
                        cache_key,
                        seq: seq as usize,
                        chunk: CodeChunk {
                            chunk_type: kind.parse::<ChunkType>()?,
                            breadcrumb,
                            start_line: start_line as usize,
                            end_line: end_line as usize,
                            content,
                            chunk_hash: hash,
                        },
                    })
                },
            )
            .collect()
    }

    /// Number of chunk rows under `tag`
    pub fn count_chunks(&self, tag: &IndexTag) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE tag = ?1",
            params![tag.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
