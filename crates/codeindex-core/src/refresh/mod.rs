//! Incremental diffing against committed baselines
//!
//! A refresh is two-phase. [`Database::compute_refresh_diff`] compares the
//! current [`FileStats`] of a directory with the last committed baseline of an
//! [`IndexTag`] and returns the files to add and remove together with a
//! [`PendingCommit`]. The baseline only advances when that value is handed to
//! [`Database::commit_baseline`], so a run that stops early leaves the old
//! baseline in place and the next diff recomputes the same work.

use crate::db::{CatalogEntry, Database};
use crate::error::Result;
use crate::ide::{FileStats, Ide};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::debug;

/// Identity of one indexing scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexTag {
    pub directory: String,
    pub branch: String,
    pub artifact_id: String,
}

impl IndexTag {
    pub fn new(
        directory: impl Into<String>,
        branch: impl Into<String>,
        artifact_id: impl Into<String>,
    ) -> Self {
        Self {
            directory: directory.into(),
            branch: branch.into(),
            artifact_id: artifact_id.into(),
        }
    }

    /// Same directory and branch, different artifact
    pub fn with_artifact(&self, artifact_id: impl Into<String>) -> Self {
        Self {
            directory: self.directory.clone(),
            branch: self.branch.clone(),
            artifact_id: artifact_id.into(),
        }
    }
}

impl fmt::Display for IndexTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.directory, self.branch, self.artifact_id)
    }
}

/// A file path with the content hash it was (or will be) indexed under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathAndCacheKey {
    pub path: String,
    pub cache_key: String,
}

/// Files an artifact indexer must process for one tag
///
/// `added` holds new and modified files, `removed` holds files that vanished
/// since the baseline. Both are sorted by path and never share a path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshDiff {
    pub added: Vec<PathAndCacheKey>,
    pub removed: Vec<PathAndCacheKey>,
    /// Files skipped because the baseline already covers them
    pub unchanged: usize,
}

impl RefreshDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Number of add and remove operations
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len()
    }
}

/// Baseline update computed alongside a [`RefreshDiff`]
///
/// Not `Clone`; a pending commit is applied at most once.
#[must_use = "the baseline only advances when the pending commit is passed to Database::commit_baseline"]
#[derive(Debug)]
pub struct PendingCommit {
    tag: IndexTag,
    upserts: Vec<CatalogEntry>,
    removals: Vec<String>,
    clears_dirty: bool,
}

impl PendingCommit {
    pub fn tag(&self) -> &IndexTag {
        &self.tag
    }

    /// True when committing would not change the stored baseline
    pub fn is_noop(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty() && !self.clears_dirty
    }
}

/// Cache key of a file's content (SHA-256, hex)
pub fn cache_key(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl Database {
    /// Diff `stats` against the committed baseline of `tag`
    ///
    /// Only files that are new or whose modification marker moved are read.
    /// A touched file whose content hash matches the baseline counts as
    /// unchanged; its new marker is folded into the pending commit. Files an
    /// interrupted update already wrote to the store are always redone, and
    /// removed when they exist neither on disk nor in the baseline. Read
    /// failures propagate to the caller.
    pub async fn compute_refresh_diff(
        &self,
        tag: &IndexTag,
        stats: &FileStats,
        ide: &dyn Ide,
    ) -> Result<(RefreshDiff, PendingCommit)> {
        let baseline = self.catalog_entries(tag)?;
        let dirty = self.dirty_entries(tag)?;

        let mut diff = RefreshDiff::default();
        let mut upserts = Vec::new();
        let mut removals = Vec::new();

        for (path, stat) in stats.iter() {
            let previous = baseline.get(path).filter(|_| !dirty.contains_key(path));
            if let Some(entry) = previous {
                if entry.last_modified == stat.last_modified && entry.size == stat.size {
                    diff.unchanged += 1;
                    continue;
                }
            }

            let content = ide.read_file(path).await?;
            let key = cache_key(&content);

            match previous {
                Some(entry) if entry.cache_key == key => diff.unchanged += 1,
                _ => diff.added.push(PathAndCacheKey {
                    path: path.clone(),
                    cache_key: key.clone(),
                }),
            }

            upserts.push(CatalogEntry {
                path: path.clone(),
                cache_key: key,
                last_modified: stat.last_modified,
                size: stat.size,
            });
        }

        for (path, entry) in &baseline {
            if !stats.contains(path) {
                diff.removed.push(PathAndCacheKey {
                    path: path.clone(),
                    cache_key: entry.cache_key.clone(),
                });
                removals.push(path.clone());
            }
        }

        for (path, key) in &dirty {
            if !stats.contains(path) && !baseline.contains_key(path) {
                diff.removed.push(PathAndCacheKey {
                    path: path.clone(),
                    cache_key: key.clone(),
                });
                removals.push(path.clone());
            }
        }
        diff.removed.sort_by(|a, b| a.path.cmp(&b.path));

        debug!(
            tag = %tag,
            added = diff.added.len(),
            removed = diff.removed.len(),
            unchanged = diff.unchanged,
            "Computed refresh diff"
        );

        let pending = PendingCommit {
            tag: tag.clone(),
            upserts,
            removals,
            clears_dirty: !dirty.is_empty(),
        };
        Ok((diff, pending))
    }

    /// Replace the stored baseline of the pending commit's tag
    pub fn commit_baseline(&self, pending: PendingCommit) -> Result<()> {
        if pending.is_noop() {
            return Ok(());
        }

        self.in_transaction(|| {
            self.clear_dirty(&pending.tag)?;
            for path in &pending.removals {
                self.delete_catalog_entry(&pending.tag, path)?;
            }
            for entry in &pending.upserts {
                self.upsert_catalog_entry(&pending.tag, entry)?;
            }
            Ok(())
        })?;

        debug!(
            tag = %pending.tag,
            upserts = pending.upserts.len(),
            removals = pending.removals.len(),
            "Committed baseline"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::ide::FileStat;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    /// Workspace held entirely in memory
    #[derive(Default)]
    struct MemoryIde {
        files: Mutex<HashMap<String, String>>,
        reads: Mutex<Vec<String>>,
    }

    impl MemoryIde {
        fn set(&self, path: &str, content: &str) {
            self.files
                .lock()
                .unwrap()
                .insert(path.to_string(), content.to_string());
        }

        fn take_reads(&self) -> Vec<String> {
            std::mem::take(&mut *self.reads.lock().unwrap())
        }
    }

    #[async_trait]
    impl Ide for MemoryIde {
        async fn read_file(&self, path: &str) -> Result<String> {
            self.reads.lock().unwrap().push(path.to_string());
            self.files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| Error::Io(std::io::Error::from(std::io::ErrorKind::NotFound)))
        }

        async fn get_stats(&self, _directory: &str) -> Result<FileStats> {
            Ok(FileStats::new())
        }

        async fn get_branch(&self, _directory: &str) -> Result<String> {
            Ok("main".to_string())
        }

        async fn get_repo_name(&self, _directory: &str) -> Result<String> {
            Ok("repo".to_string())
        }
    }

    fn stat(last_modified: i64) -> FileStat {
        FileStat {
            last_modified,
            size: 1,
        }
    }

    fn stats(entries: &[(&str, i64)]) -> FileStats {
        entries
            .iter()
            .map(|(p, m)| (p.to_string(), stat(*m)))
            .collect()
    }

    fn paths(items: &[PathAndCacheKey]) -> Vec<&str> {
        items.iter().map(|i| i.path.as_str()).collect()
    }

    fn setup() -> (Database, MemoryIde, IndexTag) {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        (db, MemoryIde::default(), IndexTag::new("/w", "main", "chunks"))
    }

    #[test]
    fn test_tag_display_and_equality() {
        let tag = IndexTag::new("/w", "main", "chunks");
        assert_eq!(tag.to_string(), "/w::main::chunks");
        assert_eq!(tag, IndexTag::new("/w", "main", "chunks"));
        assert_ne!(tag, tag.with_artifact("snippets"));
        assert_ne!(tag, IndexTag::new("/w", "dev", "chunks"));
    }

    #[tokio::test]
    async fn test_first_diff_adds_everything() {
        let (db, ide, tag) = setup();
        ide.set("/w/a", "a");
        ide.set("/w/b", "b");

        let (diff, pending) = db
            .compute_refresh_diff(&tag, &stats(&[("/w/b", 1), ("/w/a", 1)]), &ide)
            .await
            .unwrap();

        assert_eq!(paths(&diff.added), vec!["/w/a", "/w/b"]);
        assert!(diff.removed.is_empty());
        assert_eq!(diff.added[0].cache_key, cache_key("a"));
        assert!(!pending.is_noop());
    }

    #[tokio::test]
    async fn test_uncommitted_diff_is_recomputed() {
        let (db, ide, tag) = setup();
        ide.set("/w/a", "a");
        let current = stats(&[("/w/a", 1)]);

        let (first, _dropped) = db.compute_refresh_diff(&tag, &current, &ide).await.unwrap();
        let (second, _) = db.compute_refresh_diff(&tag, &current, &ide).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_add_and_remove_against_baseline() {
        let (db, ide, tag) = setup();
        for p in ["/w/a", "/w/b", "/w/c"] {
            ide.set(p, p);
        }

        let (_, pending) = db
            .compute_refresh_diff(&tag, &stats(&[("/w/a", 1), ("/w/b", 1)]), &ide)
            .await
            .unwrap();
        db.commit_baseline(pending).unwrap();
        ide.take_reads();

        let (diff, _) = db
            .compute_refresh_diff(&tag, &stats(&[("/w/a", 1), ("/w/c", 1)]), &ide)
            .await
            .unwrap();

        assert_eq!(paths(&diff.added), vec!["/w/c"]);
        assert_eq!(paths(&diff.removed), vec!["/w/b"]);
        assert_eq!(diff.removed[0].cache_key, cache_key("/w/b"));
        assert_eq!(diff.unchanged, 1);
        assert_eq!(ide.take_reads(), vec!["/w/c"]);
    }

    #[tokio::test]
    async fn test_touched_file_with_same_content_is_unchanged() {
        let (db, ide, tag) = setup();
        ide.set("/w/a", "same");

        let (_, pending) = db
            .compute_refresh_diff(&tag, &stats(&[("/w/a", 1)]), &ide)
            .await
            .unwrap();
        db.commit_baseline(pending).unwrap();

        let (diff, pending) = db
            .compute_refresh_diff(&tag, &stats(&[("/w/a", 2)]), &ide)
            .await
            .unwrap();
        assert!(diff.is_empty());
        assert_eq!(diff.unchanged, 1);
        db.commit_baseline(pending).unwrap();

        assert_eq!(db.catalog_entries(&tag).unwrap()["/w/a"].last_modified, 2);
        ide.take_reads();

        let (diff, pending) = db
            .compute_refresh_diff(&tag, &stats(&[("/w/a", 2)]), &ide)
            .await
            .unwrap();
        assert!(diff.is_empty());
        assert!(pending.is_noop());
        assert!(ide.take_reads().is_empty());
    }

    #[tokio::test]
    async fn test_modified_content_is_re_added() {
        let (db, ide, tag) = setup();
        ide.set("/w/a", "v1");
        let (_, pending) = db
            .compute_refresh_diff(&tag, &stats(&[("/w/a", 1)]), &ide)
            .await
            .unwrap();
        db.commit_baseline(pending).unwrap();

        ide.set("/w/a", "v2");
        let (diff, _) = db
            .compute_refresh_diff(&tag, &stats(&[("/w/a", 2)]), &ide)
            .await
            .unwrap();
        assert_eq!(paths(&diff.added), vec!["/w/a"]);
        assert_eq!(diff.added[0].cache_key, cache_key("v2"));
        assert!(diff.removed.is_empty());
    }

    #[tokio::test]
    async fn test_interrupted_writes_are_redone() {
        let (db, ide, tag) = setup();
        ide.set("/w/a", "v1");
        let current = stats(&[("/w/a", 1)]);
        let (_, pending) = db.compute_refresh_diff(&tag, &current, &ide).await.unwrap();
        db.commit_baseline(pending).unwrap();

        // An update wrote a newer version of `a` and an extra file `b`, then stopped
        db.mark_dirty(&tag, &PathAndCacheKey { path: "/w/a".into(), cache_key: cache_key("v2") })
            .unwrap();
        db.mark_dirty(&tag, &PathAndCacheKey { path: "/w/b".into(), cache_key: cache_key("b") })
            .unwrap();

        let (diff, pending) = db.compute_refresh_diff(&tag, &current, &ide).await.unwrap();
        assert_eq!(paths(&diff.added), vec!["/w/a"]);
        assert_eq!(diff.added[0].cache_key, cache_key("v1"));
        assert_eq!(paths(&diff.removed), vec!["/w/b"]);
        assert_eq!(diff.removed[0].cache_key, cache_key("b"));

        db.commit_baseline(pending).unwrap();
        assert!(db.dirty_entries(&tag).unwrap().is_empty());
        let (again, pending) = db.compute_refresh_diff(&tag, &current, &ide).await.unwrap();
        assert!(again.is_empty());
        assert!(pending.is_noop());
    }

    #[tokio::test]
    async fn test_read_failure_propagates() {
        let (db, ide, tag) = setup();
        let result = db
            .compute_refresh_diff(&tag, &stats(&[("/w/missing", 1)]), &ide)
            .await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_baselines_are_per_tag() {
        let (db, ide, tag) = setup();
        ide.set("/w/a", "a");
        let current = stats(&[("/w/a", 1)]);

        let (_, pending) = db.compute_refresh_diff(&tag, &current, &ide).await.unwrap();
        db.commit_baseline(pending).unwrap();

        let other = tag.with_artifact("sqliteFts");
        let (diff, _) = db.compute_refresh_diff(&other, &current, &ide).await.unwrap();
        assert_eq!(paths(&diff.added), vec!["/w/a"]);
    }

    proptest! {
        #[test]
        fn prop_diff_partitions_files(
            before in prop::collection::btree_map("[a-f]", 0u8..3, 0..6),
            after in prop::collection::btree_map("[a-f]", 0u8..3, 0..6),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let (db, ide, tag) = setup();

                let snapshot = |files: &BTreeMap<String, u8>, epoch: i64| -> FileStats {
                    files
                        .iter()
                        .map(|(p, v)| (p.clone(), stat(epoch * 10 + *v as i64)))
                        .collect()
                };

                for (p, v) in &before {
                    ide.set(p, &format!("{}", v));
                }
                let (_, pending) = db
                    .compute_refresh_diff(&tag, &snapshot(&before, 1), &ide)
                    .await
                    .unwrap();
                db.commit_baseline(pending).unwrap();

                for (p, v) in &after {
                    ide.set(p, &format!("{}", v));
                }
                let (diff, pending) = db
                    .compute_refresh_diff(&tag, &snapshot(&after, 2), &ide)
                    .await
                    .unwrap();

                let expected_added: Vec<&str> = after
                    .iter()
                    .filter(|(p, v)| before.get(*p) != Some(*v))
                    .map(|(p, _)| p.as_str())
                    .collect();
                let expected_removed: Vec<&str> = before
                    .keys()
                    .filter(|p| !after.contains_key(*p))
                    .map(|p| p.as_str())
                    .collect();

                assert_eq!(paths(&diff.added), expected_added);
                assert_eq!(paths(&diff.removed), expected_removed);
                assert_eq!(diff.unchanged + diff.added.len(), after.len());

                db.commit_baseline(pending).unwrap();
                let (again, pending) = db
                    .compute_refresh_diff(&tag, &snapshot(&after, 2), &ide)
                    .await
                    .unwrap();
                assert!(again.is_empty());
                assert!(pending.is_noop());
            });
        }
    }
}
