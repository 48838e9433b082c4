//! Chunk index: AST-aware chunks of every file

use super::{run_file_ops, ArtifactStream, CodebaseIndex, FileOpHandler, CHUNKS_ARTIFACT_ID};
use crate::db::Database;
use crate::error::Result;
use crate::ide::Ide;
use crate::index::{CodeChunk, SemanticChunker};
use crate::refresh::{IndexTag, PathAndCacheKey, PendingCommit, RefreshDiff};
use crate::remote::RemoteCacheClient;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

pub struct ChunkCodebaseIndex<'a> {
    db: &'a Database,
    ide: Arc<dyn Ide>,
    chunker: SemanticChunker,
    max_file_bytes: u64,
    remote: Option<RemoteCacheClient>,
}

impl<'a> ChunkCodebaseIndex<'a> {
    pub fn new(db: &'a Database, ide: Arc<dyn Ide>, max_file_bytes: u64) -> Self {
        Self {
            db,
            ide,
            chunker: SemanticChunker::new(),
            max_file_bytes,
            remote: None,
        }
    }

    pub fn with_chunker(mut self, chunker: SemanticChunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn with_remote_cache(mut self, remote: Option<RemoteCacheClient>) -> Self {
        self.remote = remote;
        self
    }

    fn chunk_content(&self, path: &str, content: &str) -> Vec<CodeChunk> {
        if content.len() as u64 > self.max_file_bytes {
            return Vec::new();
        }
        self.chunker.chunk(content, Path::new(path))
    }
}

#[async_trait(?Send)]
impl FileOpHandler for ChunkCodebaseIndex<'_> {
    /// Chunks the remote cache already holds, by cache key
    type Prefetch = HashMap<String, Vec<CodeChunk>>;

    async fn prefetch(
        &self,
        _tag: &IndexTag,
        added: &[PathAndCacheKey],
        repo_name: &str,
    ) -> Result<Self::Prefetch> {
        let Some(remote) = &self.remote else {
            return Ok(HashMap::new());
        };

        let keys: Vec<String> = added.iter().map(|f| f.cache_key.clone()).collect();
        match remote
            .get_from_index_cache(&keys, CHUNKS_ARTIFACT_ID, repo_name)
            .await
        {
            Ok(found) => Ok(found),
            Err(e) => {
                warn!(error = %e, url = remote.url(), "Remote chunk cache unavailable, chunking locally");
                Ok(HashMap::new())
            }
        }
    }

    async fn add(
        &self,
        tag: &IndexTag,
        file: &PathAndCacheKey,
        prefetch: &Self::Prefetch,
    ) -> Result<()> {
        let chunks = match prefetch.get(&file.cache_key) {
            Some(cached) => cached.clone(),
            None => {
                let content = self.ide.read_file(&file.path).await?;
                self.chunk_content(&file.path, &content)
            }
        };

        self.db
            .replace_chunks(tag, &file.path, &file.cache_key, &chunks)
    }

    async fn remove(&self, tag: &IndexTag, file: &PathAndCacheKey) -> Result<()> {
        self.db.delete_chunks(tag, &file.path)?;
        Ok(())
    }
}

impl CodebaseIndex for ChunkCodebaseIndex<'_> {
    fn artifact_id(&self) -> &str {
        CHUNKS_ARTIFACT_ID
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
