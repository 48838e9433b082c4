//! Vector index: one embedding per stored chunk
//!
//! Reads the chunks the chunk index committed for the same directory and
//! branch, so it must run after it.

use super::{
    run_file_ops, ArtifactStream, CodebaseIndex, FileOpHandler, CHUNKS_ARTIFACT_ID,
    VECTOR_ARTIFACT_PREFIX,
};
use crate::db::{CacheLookupResult, CatalogEntry, Database, EmbeddingRow};
use crate::error::{Error, Result};
use crate::llm::Embedder;
use crate::refresh::{IndexTag, PathAndCacheKey, PendingCommit, RefreshDiff};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_BATCH_SIZE: usize = 32;

pub struct EmbeddingsCodebaseIndex<'a> {
    db: &'a Database,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    artifact_id: String,
}

impl<'a> EmbeddingsCodebaseIndex<'a> {
    pub fn new(db: &'a Database, embedder: Arc<dyn Embedder>) -> Self {
        let artifact_id = format!("{}{}", VECTOR_ARTIFACT_PREFIX, embedder.model_name());
        Self {
            db,
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
            artifact_id,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Make sure cached vectors match the embedder's dimensions
    fn ensure_model(&self) -> Result<()> {
        let model = self.embedder.model_name();
        let dims = self.embedder.dimensions();

        match self.db.get_model_dimensions(model)? {
            Some(stored) if stored != dims => {
                let cleared = self.db.clear_cached_embeddings(model)?;
                info!(
                    model,
                    old = stored,
                    new = dims,
                    cleared,
                    "Embedding dimensions changed, dropped cached vectors"
                );
            }
            _ => {}
        }
        self.db.register_model(model, dims)
    }

    async fn embed_missing(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embeddings = self.embedder.embed_batch(batch).await?;
            if embeddings.len() != batch.len() {
                return Err(Error::Embedding(format!(
                    "embedder returned {} vectors for {} chunks",
                    embeddings.len(),
                    batch.len()
                )));
            }
            out.extend(embeddings);
        }
        Ok(out)
    }
}

#[async_trait(?Send)]
impl FileOpHandler for EmbeddingsCodebaseIndex<'_> {
    /// The chunk index's committed baseline for this directory and branch
    type Prefetch = BTreeMap<String, CatalogEntry>;

    async fn prefetch(
        &self,
        tag: &IndexTag,
        _added: &[PathAndCacheKey],
        _repo_name: &str,
    ) -> Result<Self::Prefetch> {
        self.ensure_model()?;
        self.db
            .catalog_entries(&tag.with_artifact(CHUNKS_ARTIFACT_ID))
    }

    async fn add(
        &self,
        tag: &IndexTag,
        file: &PathAndCacheKey,
        chunk_baseline: &Self::Prefetch,
    ) -> Result<()> {
        let chunked = chunk_baseline
            .get(&file.path)
            .is_some_and(|e| e.cache_key == file.cache_key);
        if !chunked {
            return Err(Error::MissingChunks {
                path: file.path.clone(),
                cache_key: file.cache_key.clone(),
            });
        }

        let chunk_tag = tag.with_artifact(CHUNKS_ARTIFACT_ID);
        let chunks = self
            .db
            .get_chunks(&chunk_tag, &file.path, &file.cache_key)?;

        let model = self.embedder.model_name();
        let dims = self.embedder.dimensions();

        let mut vectors: Vec<Option<Vec<f32>>> = Vec::with_capacity(chunks.len());
        let mut missing = Vec::new();
        for stored in &chunks {
            match self
                .db
                .get_cached_embedding(&stored.chunk.chunk_hash, model, dims)?
            {
                CacheLookupResult::Hit(v) => vectors.push(Some(v)),
                CacheLookupResult::Miss | CacheLookupResult::ModelMismatch => {
                    missing.push(stored.chunk.content.clone());
                    vectors.push(None);
                }
            }
        }

        let cached = chunks.len() - missing.len();
        let mut fresh = self.embed_missing(&missing).await?.into_iter();

        let mut rows = Vec::with_capacity(chunks.len());
        for (stored, vector) in chunks.iter().zip(vectors) {
            let embedding = match vector {
                Some(v) => v,
                None => fresh
                    .next()
                    .ok_or_else(|| Error::Embedding("embedder returned too few vectors".into()))?,
            };
            rows.push(EmbeddingRow {
                seq: stored.seq,
                chunk_hash: stored.chunk.chunk_hash.clone(),
                embedding,
            });
        }

        debug!(
            path = %file.path,
            chunks = rows.len(),
            cached,
            "Embedded file"
        );
        self.db
            .replace_embeddings(tag, &file.path, &file.cache_key, model, &rows)
    }

    async fn remove(&self, tag: &IndexTag, file: &PathAndCacheKey) -> Result<()> {
        self.db.delete_embeddings(tag, &file.path)?;
        Ok(())
    }
}

impl CodebaseIndex for EmbeddingsCodebaseIndex<'_> {
    fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    fn update<'s>(
        &'s self,
        tag: IndexTag,
        diff: RefreshDiff,
        commit: PendingCommit,
        repo_name: String,
    ) -> ArtifactStream<'s> {
        run_file_ops(self, self.db, tag, diff, commit, repo_name)
    }
}
