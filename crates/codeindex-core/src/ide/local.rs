//! File-system backed workspace

use super::{FileStat, FileStats, Ide};
use crate::config::ScanConfig;
use crate::error::{Error, Result};
use crate::index::{scan_files, ScanOptions};
use async_trait::async_trait;
use git2::{ErrorCode, Repository};
use std::path::{Path, PathBuf};

/// Branch name reported outside of a git repository
pub const NO_BRANCH: &str = "NONE";

/// [`Ide`] over the local file system and its git repository
#[derive(Debug, Clone, Default)]
pub struct LocalIde {
    options: ScanOptions,
}

impl LocalIde {
    pub fn new(scan: &ScanConfig) -> Self {
        Self {
            options: ScanOptions::from(scan),
        }
    }
}

#[async_trait]
impl Ide for LocalIde {
    async fn read_file(&self, path: &str) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn get_stats(&self, directory: &str) -> Result<FileStats> {
        let root = PathBuf::from(directory);
        if !root.is_dir() {
            return Err(Error::DirectoryNotFound(directory.to_string()));
        }

        let options = self.options.clone();
        let scanned = tokio::task::spawn_blocking(move || scan_files(&root, &options))
            .await
            .map_err(|e| Error::Index(format!("scan task failed: {}", e)))??;

        Ok(scanned
            .into_iter()
            .map(|r| {
                (
                    r.path.to_string_lossy().to_string(),
                    FileStat {
                        last_modified: r.last_modified,
                        size: r.size,
                    },
                )
            })
            .collect())
    }

    async fn get_branch(&self, directory: &str) -> Result<String> {
        let dir = PathBuf::from(directory);
        tokio::task::spawn_blocking(move || branch_of(&dir))
            .await
            .map_err(|e| Error::Index(format!("git task failed: {}", e)))?
    }

    async fn get_repo_name(&self, directory: &str) -> Result<String> {
        let dir = PathBuf::from(directory);
        let origin = tokio::task::spawn_blocking(move || origin_url(&dir))
            .await
            .map_err(|e| Error::Index(format!("git task failed: {}", e)))??;

        Ok(origin.unwrap_or_else(|| {
            Path::new(directory)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| directory.to_string())
        }))
    }
}

/// Repository containing `dir`, if any
fn discover(dir: &Path) -> Result<Option<Repository>> {
    match Repository::discover(dir) {
        Ok(repo) => Ok(Some(repo)),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn branch_of(dir: &Path) -> Result<String> {
    let Some(repo) = discover(dir)? else {
        return Ok(NO_BRANCH.to_string());
    };

    let head = match repo.head() {
        Ok(head) => head,
        // No commits yet: HEAD still names the branch
        Err(e) if e.code() == ErrorCode::UnbornBranch => {
            let head = repo.find_reference("HEAD")?;
            return Ok(head
                .symbolic_target()
                .map(|target| target.strip_prefix("refs/heads/").unwrap_or(target))
                .unwrap_or(NO_BRANCH)
                .to_string());
        }
        Err(e) => return Err(e.into()),
    };

    if repo.head_detached()? {
        return Ok(head
            .target()
            .map(|oid| oid.to_string().chars().take(8).collect())
            .unwrap_or_else(|| NO_BRANCH.to_string()));
    }

    Ok(head.shorthand().unwrap_or(NO_BRANCH).to_string())
}

fn origin_url(dir: &Path) -> Result<Option<String>> {
    let Some(repo) = discover(dir)? else {
        return Ok(None);
    };

    let remote = match repo.find_remote("origin") {
        Ok(remote) => remote,
        Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(remote.url().map(str::to_string))
}
