//! Vector store
//!
//! Embeddings are stored as little-endian f32 BLOBs. Besides the per-tag
//! `embeddings` rows, a global `chunk_embeddings` cache keyed by
//! `(chunk_hash, model)` lets identical chunks on other files or branches
//! skip the embedder entirely.

use super::Database;
use crate::error::Result;
use crate::refresh::IndexTag;
use chrono::Utc;
use rusqlite::params;

/// Result of looking up a cached embedding
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookupResult {
    Hit(Vec<f32>),
    Miss,
    /// The model's stored dimensions differ from the embedder's
    ModelMismatch,
}

/// Embedding of one chunk of a file
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRow {
    pub seq: usize,
    pub chunk_hash: String,
    pub embedding: Vec<f32>,
}

impl Database {
    /// Replace the embeddings of `path` under `tag` and feed the global cache
    pub fn replace_embeddings(
        &self,
        tag: &IndexTag,
        path: &str,
        cache_key: &str,
        model: &str,
        rows: &[EmbeddingRow],
    ) -> Result<()> {
        let tag = tag.to_string();
        let now = Utc::now().to_rfc3339();

        self.in_transaction(|| {
            self.conn.execute(
                "DELETE FROM embeddings WHERE tag = ?1 AND path = ?2",
                params![tag, path],
            )?;

            let mut insert = self.conn.prepare_cached(
                "INSERT INTO embeddings (tag, path, cache_key, seq, chunk_hash, model, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            let mut cache = self.conn.prepare_cached(
                "INSERT OR IGNORE INTO chunk_embeddings (chunk_hash, model, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;

            for row in rows {
                let bytes = embedding_to_bytes(&row.embedding);
                insert.execute(params![
                    tag,
                    path,
                    cache_key,
                    row.seq as i64,
                    row.chunk_hash,
                    model,
                    bytes,
                    now
                ])?;
                cache.execute(params![row.chunk_hash, model, bytes, now])?;
            }
            Ok(())
        })
    }

    /// Remove every embedding of `path` under `tag`
    pub fn delete_embeddings(&self, tag: &IndexTag, path: &str) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM embeddings WHERE tag = ?1 AND path = ?2",
            params![tag.to_string(), path],
        )?;
        Ok(rows)
    }

    /// Embeddings stored for `path` under `tag`, in chunk order
    pub fn get_embeddings(&self, tag: &IndexTag, path: &str) -> Result<Vec<EmbeddingRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, chunk_hash, embedding FROM embeddings
             WHERE tag = ?1 AND path = ?2 ORDER BY seq",
        )?;

        let rows = stmt
            .query_map(params![tag.to_string(), path], |row| {
                let bytes: Vec<u8> = row.get(2)?;
                Ok(EmbeddingRow {
                    seq: row.get::<_, i64>(0)? as usize,
                    chunk_hash: row.get(1)?,
                    embedding: bytes_to_embedding(&bytes),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Number of embedding rows under `tag`
    pub fn count_embeddings(&self, tag: &IndexTag) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM embeddings WHERE tag = ?1",
            params![tag.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Look up a cached embedding, checking the model's registered dimensions
    pub fn get_cached_embedding(
        &self,
        chunk_hash: &str,
        model: &str,
        expected_dims: usize,
    ) -> Result<CacheLookupResult> {
        if let Some(stored) = self.get_model_dimensions(model)? {
            if stored != expected_dims {
                return Ok(CacheLookupResult::ModelMismatch);
            }
        }

        let result = self.conn.query_row(
            "SELECT embedding FROM chunk_embeddings WHERE chunk_hash = ?1 AND model = ?2",
            params![chunk_hash, model],
            |row| {
                let bytes: Vec<u8> = row.get(0)?;
                Ok(bytes_to_embedding(&bytes))
            },
        );

        match result {
            Ok(embedding) => Ok(CacheLookupResult::Hit(embedding)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(CacheLookupResult::Miss),
            Err(e) => Err(e.into()),
        }
    }

    /// Drop every cached embedding of `model`
    pub fn clear_cached_embeddings(&self, model: &str) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM chunk_embeddings WHERE model = ?1",
            params![model],
        )?;
        Ok(rows)
    }

    /// Register model with its dimensions, replacing stale dimensions
    pub fn register_model(&self, model: &str, dimensions: usize) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT INTO model_metadata (model, dimensions, created_at, last_used_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(model) DO UPDATE SET dimensions = ?2, last_used_at = ?3",
            params![model, dimensions as i64, now],
        )?;

        Ok(())
    }

    /// Get stored model dimensions
    pub fn get_model_dimensions(&self, model: &str) -> Result<Option<usize>> {
        let result = self.conn.query_row(
            "SELECT dimensions FROM model_metadata WHERE model = ?1",
            params![model],
            |row| row.get::<_, i64>(0),
        );

        match result {
            Ok(dims) => Ok(Some(dims as usize)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Convert f32 embedding to bytes (little-endian)
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert bytes to f32 embedding
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn row(seq: usize, hash: &str, value: f32) -> EmbeddingRow {
        EmbeddingRow {
            seq,
            chunk_hash: hash.to_string(),
            embedding: vec![value, -value, 0.5],
        }
    }

    #[test]
    fn test_embedding_bytes() {
        let original = vec![1.0f32, 2.0, 3.0, -1.5];
        assert_eq!(bytes_to_embedding(&embedding_to_bytes(&original)), original);
    }

    #[test]
    fn test_replace_feeds_cache() {
        let db = setup();
        let tag = IndexTag::new("/w", "main", "vectors::hash-3");
        db.register_model("hash-3", 3).unwrap();

        db.replace_embeddings(&tag, "/w/a.rs", "k", "hash-3", &[row(0, "h0", 1.0), row(1, "h1", 2.0)])
            .unwrap();
        db.replace_embeddings(&tag, "/w/a.rs", "k", "hash-3", &[row(0, "h0", 1.0)])
            .unwrap();

        assert_eq!(db.count_embeddings(&tag).unwrap(), 1);
        assert_eq!(db.get_embeddings(&tag, "/w/a.rs").unwrap(), vec![row(0, "h0", 1.0)]);

        // The cache keeps every chunk ever embedded
        assert_eq!(
            db.get_cached_embedding("h1", "hash-3", 3).unwrap(),
            CacheLookupResult::Hit(vec![2.0, -2.0, 0.5])
        );
        assert_eq!(
            db.get_cached_embedding("nope", "hash-3", 3).unwrap(),
            CacheLookupResult::Miss
        );
    }

    #[test]
    fn test_dimension_change_is_a_mismatch() {
        let db = setup();
        db.register_model("m", 3).unwrap();
        assert_eq!(
            db.get_cached_embedding("h", "m", 8).unwrap(),
            CacheLookupResult::ModelMismatch
        );

        db.register_model("m", 8).unwrap();
        assert_eq!(db.get_model_dimensions("m").unwrap(), Some(8));
        assert_eq!(db.get_cached_embedding("h", "m", 8).unwrap(), CacheLookupResult::Miss);
    }
}
