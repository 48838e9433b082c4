//! Workspace queries consumed by the indexing pipeline
//!
//! The pipeline never touches the file system directly. It asks an [`Ide`]
//! for file statistics, file contents and repository metadata, all of which
//! are read-only.

mod local;

pub use local::LocalIde;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Modification marker for a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    /// Milliseconds since the epoch
    pub last_modified: i64,
    pub size: u64,
}

/// Snapshot of every indexable file in a directory, keyed by path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileStats(BTreeMap<String, FileStat>);

impl FileStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, stat: FileStat) {
        self.0.insert(path.into(), stat);
    }

    pub fn get(&self, path: &str) -> Option<&FileStat> {
        self.0.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in path order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FileStat)> {
        self.0.iter()
    }
}

impl FromIterator<(String, FileStat)> for FileStats {
    fn from_iter<I: IntoIterator<Item = (String, FileStat)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Read-only view of the live workspace
#[async_trait]
pub trait Ide: Send + Sync {
    /// Read a file's content
    async fn read_file(&self, path: &str) -> Result<String>;

    /// Stat every indexable file under `directory`
    async fn get_stats(&self, directory: &str) -> Result<FileStats>;

    /// Current branch of the repository containing `directory`
    async fn get_branch(&self, directory: &str) -> Result<String>;

    /// Repository name for `directory`
    async fn get_repo_name(&self, directory: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stats_ordered() {
        let stat = FileStat {
            last_modified: 1,
            size: 1,
        };
        let stats: FileStats = vec![
            ("/b".to_string(), stat),
            ("/a".to_string(), stat),
        ]
        .into_iter()
        .collect();

        let paths: Vec<_> = stats.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["/a", "/b"]);
        assert!(stats.contains("/a"));
        assert_eq!(stats.len(), 2);
    }
}
