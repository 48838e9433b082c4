//! Full-text index over whole file contents

use super::{run_file_ops, ArtifactStream, CodebaseIndex, FileOpHandler, FULL_TEXT_ARTIFACT_ID};
use crate::db::Database;
use crate::error::Result;
use crate::ide::Ide;
use crate::refresh::{IndexTag, PathAndCacheKey, PendingCommit, RefreshDiff};
use async_trait::async_trait;
use std::sync::Arc;

pub struct FullTextSearchCodebaseIndex<'a> {
    db: &'a Database,
    ide: Arc<dyn Ide>,
}

impl<'a> FullTextSearchCodebaseIndex<'a> {
    pub fn new(db: &'a Database, ide: Arc<dyn Ide>) -> Self {
        Self { db, ide }
    }
}

#[async_trait(?Send)]
impl FileOpHandler for FullTextSearchCodebaseIndex<'_> {
    type Prefetch = ();

    async fn prefetch(
        &self,
        _tag: &IndexTag,
        _added: &[PathAndCacheKey],
        _repo_name: &str,
    ) -> Result<()> {
        Ok(())
    }

    async fn add(&self, tag: &IndexTag, file: &PathAndCacheKey, _: &()) -> Result<()> {
        let content = self.ide.read_file(&file.path).await?;
        self.db
            .upsert_full_text(tag, &file.path, &file.cache_key, &content)
    }

    async fn remove(&self, tag: &IndexTag, file: &PathAndCacheKey) -> Result<()> {
        self.db.delete_full_text(tag, &file.path)?;
        Ok(())
    }
}

impl CodebaseIndex for FullTextSearchCodebaseIndex<'_> {
    fn artifact_id(&self) -> &str {
        FULL_TEXT_ARTIFACT_ID
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
