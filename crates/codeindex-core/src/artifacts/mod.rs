//! Artifact indexers
//!
//! Every derived store (chunks, embeddings, full text, snippets) implements
//! [`CodebaseIndex`]. An update consumes a [`RefreshDiff`] and its
//! [`PendingCommit`], yields one progress item per processed file and commits
//! the baseline itself once the last file is stored. A consumer that stops
//! polling early therefore leaves the baseline untouched; every file it did
//! write is marked dirty so the next diff redoes it.

mod chunks;
mod embeddings;
mod full_text;
mod snippets;

pub use chunks::ChunkCodebaseIndex;
pub use embeddings::EmbeddingsCodebaseIndex;
pub use full_text::FullTextSearchCodebaseIndex;
pub use snippets::CodeSnippetsCodebaseIndex;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::refresh::{IndexTag, PathAndCacheKey, PendingCommit, RefreshDiff};
use async_trait::async_trait;
use futures::stream::{self, LocalBoxStream, StreamExt};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::Path;
use tracing::debug;

pub const CHUNKS_ARTIFACT_ID: &str = "chunks";
pub const FULL_TEXT_ARTIFACT_ID: &str = "sqliteFts";
pub const SNIPPETS_ARTIFACT_ID: &str = "codeSnippets";
/// Vector artifact ids are this prefix followed by the embedding model name
pub const VECTOR_ARTIFACT_PREFIX: &str = "vectordb::";

/// Progress of a single artifact update, local to that update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactProgress {
    /// Fraction of this update's files processed, in [0, 1]
    pub progress: f64,
    pub desc: String,
}

pub type ArtifactStream<'a> = LocalBoxStream<'a, Result<ArtifactProgress>>;

/// A derived store kept in sync with a directory
pub trait CodebaseIndex {
    /// Stable identifier, part of every [`IndexTag`] this index is diffed under
    fn artifact_id(&self) -> &str;

    /// Apply `diff` to the store, then commit the baseline
    fn update<'a>(
        &'a self,
        tag: IndexTag,
        diff: RefreshDiff,
        commit: PendingCommit,
        repo_name: String,
    ) -> ArtifactStream<'a>;
}

/// Per-file work of an index
#[async_trait(?Send)]
pub(crate) trait FileOpHandler {
    /// Looked up once per update, before the first file
    type Prefetch;

    async fn prefetch(
        &self,
        tag: &IndexTag,
        added: &[PathAndCacheKey],
        repo_name: &str,
    ) -> Result<Self::Prefetch>;

    /// Store the artifact for a new or modified file, replacing any previous version
    async fn add(
        &self,
        tag: &IndexTag,
        file: &PathAndCacheKey,
        prefetch: &Self::Prefetch,
    ) -> Result<()>;

    /// Drop the artifact of a file that no longer exists
    async fn remove(&self, tag: &IndexTag, file: &PathAndCacheKey) -> Result<()>;
}

enum FileOp {
    Remove(PathAndCacheKey),
    Add(PathAndCacheKey),
}

struct OpsState<P> {
    tag: IndexTag,
    repo_name: String,
    added: Vec<PathAndCacheKey>,
    ops: VecDeque<FileOp>,
    total: usize,
    done: usize,
    prefetch: Option<P>,
    commit: Option<PendingCommit>,
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

/// Drive `handler` over a diff: removals first, then additions, then commit
pub(crate) fn run_file_ops<'a, H>(
    handler: &'a H,
    db: &'a Database,
    tag: IndexTag,
    diff: RefreshDiff,
    commit: PendingCommit,
    repo_name: String,
) -> ArtifactStream<'a>
where
    H: FileOpHandler + 'a,
    H::Prefetch: 'a,
{
    let total = diff.len();
    let ops: VecDeque<FileOp> = diff
        .removed
        .into_iter()
        .map(FileOp::Remove)
        .chain(diff.added.iter().cloned().map(FileOp::Add))
        .collect();

    let state = OpsState {
        tag,
        repo_name,
        added: diff.added,
        ops,
        total,
        done: 0,
        prefetch: None,
        commit: Some(commit),
    };

    stream::try_unfold(state, move |mut st| async move {
        if let Some(op) = st.ops.pop_front() {
            let prefetch = match st.prefetch.take() {
                Some(p) => p,
                None => handler.prefetch(&st.tag, &st.added, &st.repo_name).await?,
            };

            let desc = match &op {
                FileOp::Remove(file) => {
                    debug!(tag = %st.tag, path = %file.path, "Removing");
                    db.mark_dirty(&st.tag, file)?;
                    handler.remove(&st.tag, file).await?;
                    format!("Removing {}", file_name(&file.path))
                }
                FileOp::Add(file) => {
                    debug!(tag = %st.tag, path = %file.path, "Indexing");
                    db.mark_dirty(&st.tag, file)?;
                    handler.add(&st.tag, file, &prefetch).await?;
                    format!("Indexing {}", file_name(&file.path))
                }
            };
            st.prefetch = Some(prefetch);
            st.done += 1;

            let item = ArtifactProgress {
                progress: st.done as f64 / st.total as f64,
                desc,
            };
            return Ok(Some((item, st)));
        }

        if let Some(commit) = st.commit.take() {
            db.commit_baseline(commit)?;
        }
        Ok::<_, Error>(None)
    })
    .boxed_local()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Recorder {
        calls: RefCell<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait(?Send)]
    impl FileOpHandler for Recorder {
        type Prefetch = usize;

        async fn prefetch(
            &self,
            _tag: &IndexTag,
            added: &[PathAndCacheKey],
            _repo_name: &str,
        ) -> Result<usize> {
            self.calls.borrow_mut().push("prefetch".to_string());
            Ok(added.len())
        }

        async fn add(&self, _tag: &IndexTag, file: &PathAndCacheKey, prefetch: &usize) -> Result<()> {
            if self.fail_on == Some(file.path.as_str()) {
                return Err(Error::Index(format!("cannot index {}", file.path)));
            }
            self.calls
                .borrow_mut()
                .push(format!("add {} ({})", file.path, prefetch));
            Ok(())
        }

        async fn remove(&self, _tag: &IndexTag, file: &PathAndCacheKey) -> Result<()> {
            self.calls.borrow_mut().push(format!("remove {}", file.path));
            Ok(())
        }
    }

    fn key(path: &str) -> PathAndCacheKey {
        PathAndCacheKey {
            path: path.to_string(),
            cache_key: format!("key-{}", path),
        }
    }

    async fn pending_for(db: &Database, tag: &IndexTag) -> PendingCommit {
        let stats = crate::ide::FileStats::new();
        let ide = crate::ide::LocalIde::default();
        db.compute_refresh_diff(tag, &stats, &ide).await.unwrap().1
    }

    #[tokio::test]
    async fn test_removals_run_before_additions() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let tag = IndexTag::new("/w", "main", "test");
        let recorder = Recorder {
            calls: RefCell::new(Vec::new()),
            fail_on: None,
        };
        let diff = RefreshDiff {
            added: vec![key("/w/a"), key("/w/b")],
            removed: vec![key("/w/z")],
            unchanged: 0,
        };

        let commit = pending_for(&db, &tag).await;
        let updates: Vec<ArtifactProgress> = run_file_ops(&recorder, &db, tag, diff, commit, "repo".into())
            .map(|r| r.unwrap())
            .collect()
            .await;

        let progress: Vec<f64> = updates.iter().map(|u| u.progress).collect();
        assert_eq!(progress, vec![1.0 / 3.0, 2.0 / 3.0, 1.0]);
        assert_eq!(updates[0].desc, "Removing z");
        assert_eq!(
            *recorder.calls.borrow(),
            vec!["prefetch", "remove /w/z", "add /w/a (2)", "add /w/b (2)"]
        );
    }

    #[tokio::test]
    async fn test_empty_diff_yields_nothing() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let tag = IndexTag::new("/w", "main", "test");
        let recorder = Recorder {
            calls: RefCell::new(Vec::new()),
            fail_on: None,
        };

        let commit = pending_for(&db, &tag).await;
        let updates: Vec<_> = run_file_ops(&recorder, &db, tag, RefreshDiff::default(), commit, "r".into())
            .collect()
            .await;
        assert!(updates.is_empty());
        assert!(recorder.calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let tag = IndexTag::new("/w", "main", "test");
        let recorder = Recorder {
            calls: RefCell::new(Vec::new()),
            fail_on: Some("/w/a"),
        };
        let diff = RefreshDiff {
            added: vec![key("/w/a"), key("/w/b")],
            removed: vec![],
            unchanged: 0,
        };

        let commit = pending_for(&db, &tag).await;
        let results: Vec<_> = run_file_ops(&recorder, &db, tag, diff, commit, "r".into())
            .collect()
            .await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[tokio::test]
    async fn test_written_files_stay_dirty_until_commit() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let tag = IndexTag::new("/w", "main", "test");
        let recorder = Recorder {
            calls: RefCell::new(Vec::new()),
            fail_on: None,
        };
        let diff = RefreshDiff {
            added: vec![key("/w/a"), key("/w/b")],
            removed: vec![],
            unchanged: 0,
        };

        let commit = pending_for(&db, &tag).await;
        let mut updates = run_file_ops(&recorder, &db, tag.clone(), diff.clone(), commit, "r".into());
        updates.next().await.unwrap().unwrap();
        drop(updates);
        let dirty = db.dirty_entries(&tag).unwrap();
        assert_eq!(dirty.keys().collect::<Vec<_>>(), vec!["/w/a"]);
        assert_eq!(dirty["/w/a"], "key-/w/a");

        let commit = pending_for(&db, &tag).await;
        let finished: Vec<_> = run_file_ops(&recorder, &db, tag.clone(), diff, commit, "r".into())
            .collect()
            .await;
        assert_eq!(finished.len(), 2);
        assert!(db.dirty_entries(&tag).unwrap().is_empty());
    }
}
