//! The refresh orchestrator

use super::pause::PauseToken;
use super::progress::{overall_progress, IndexingProgressUpdate, IndexingStatus, ProgressTracker};
use crate::artifacts::{
    ChunkCodebaseIndex, CodeSnippetsCodebaseIndex, CodebaseIndex, EmbeddingsCodebaseIndex,
    FullTextSearchCodebaseIndex,
};
use crate::config::{Config, ConfigHandler, EmbeddingsProviderConfig};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::ide::Ide;
use crate::llm::{embedder_from_config, Embedder};
use crate::refresh::IndexTag;
use crate::remote::RemoteCacheClient;
use async_stream::stream;
use futures::stream::{LocalBoxStream, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Keeps every artifact store of a set of workspace directories in sync
///
/// Directories and artifacts are processed one at a time. Refresh calls on
/// the same database must not overlap.
pub struct CodebaseIndexer<'a> {
    db: &'a Database,
    config_handler: Arc<dyn ConfigHandler>,
    ide: Arc<dyn Ide>,
    pause: PauseToken,
    remote: Option<RemoteCacheClient>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl<'a> CodebaseIndexer<'a> {
    pub fn new(
        db: &'a Database,
        config_handler: Arc<dyn ConfigHandler>,
        ide: Arc<dyn Ide>,
        pause: PauseToken,
        remote: Option<RemoteCacheClient>,
    ) -> Self {
        Self {
            db,
            config_handler,
            ide,
            pause,
            remote,
            embedder: None,
        }
    }

    /// Use this embedder instead of the one named in the config
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn pause_token(&self) -> &PauseToken {
        &self.pause
    }

    /// Artifact indexes in the order they must run; chunks come first
    fn indexes_to_build(&self, config: &Config) -> Result<Vec<Box<dyn CodebaseIndex + 'a>>> {
        let embedder = match &self.embedder {
            Some(embedder) => Arc::clone(embedder),
            None => embedder_from_config(&config.embeddings)?,
        };
        let max_file_bytes = config.scan.max_file_bytes;

        let mut embeddings = EmbeddingsCodebaseIndex::new(self.db, embedder);
        if let EmbeddingsProviderConfig::Http { batch_size, .. } = &config.embeddings {
            embeddings = embeddings.with_batch_size(*batch_size);
        }

        Ok(vec![
            Box::new(
                ChunkCodebaseIndex::new(self.db, Arc::clone(&self.ide), max_file_bytes)
                    .with_remote_cache(self.remote.clone()),
            ),
            Box::new(embeddings),
            Box::new(FullTextSearchCodebaseIndex::new(self.db, Arc::clone(&self.ide))),
            Box::new(CodeSnippetsCodebaseIndex::new(
                self.db,
                Arc::clone(&self.ide),
                max_file_bytes,
            )),
        ])
    }

    /// Block while paused; false when cancelled in the meantime
    async fn wait_if_paused(&self, cancel: &CancellationToken) -> bool {
        if self.pause.is_paused() {
            debug!("Indexing paused");
            tokio::select! {
                _ = self.pause.wait_until_resumed() => debug!("Indexing resumed"),
                _ = cancel.cancelled() => {}
            }
        }
        !cancel.is_cancelled()
    }

    fn failure(artifact: Option<&str>, err: &Error) -> IndexingProgressUpdate {
        match artifact {
            Some(artifact) => warn!(artifact, error = %err, "Error updating the {} index", artifact),
            None => warn!(error = %err, "Indexing failed"),
        }
        IndexingProgressUpdate::failed(err.to_string())
    }

    /// Bring every artifact of `directories` up to date
    ///
    /// The stream ends after its first `disabled`, `done`, `failed` or
    /// `cancelled` update. The first artifact failure ends the whole run; a
    /// later refresh redoes only the work whose baseline was not committed.
    pub fn refresh<'s>(
        &'s self,
        directories: Vec<String>,
        cancel: CancellationToken,
    ) -> LocalBoxStream<'s, IndexingProgressUpdate> {
        stream! {
            if directories.is_empty() {
                yield IndexingProgressUpdate::disabled("Nothing to index");
                return;
            }

            let config = match self.config_handler.load_config().await {
                Ok(config) => config,
                Err(e) => {
                    yield Self::failure(None, &e);
                    return;
                }
            };
            if config.disable_indexing {
                yield IndexingProgressUpdate::disabled("Indexing is disabled in config.yml");
                return;
            }

            let mut tracker = ProgressTracker::default();
            yield tracker.update(0.0, "Starting indexing", IndexingStatus::Loading);

            let indexes = match self.indexes_to_build(&config) {
                Ok(indexes) => indexes,
                Err(e) => {
                    yield Self::failure(None, &e);
                    return;
                }
            };
            if let Err(e) = self.ide.get_repo_name(&directories[0]).await {
                yield Self::failure(None, &e);
                return;
            }
            yield tracker.update(0.0, "Starting indexing...", IndexingStatus::Loading);

            let total_dirs = directories.len();
            let total_artifacts = indexes.len();

            for (completed_dirs, directory) in directories.iter().enumerate() {
                if cancel.is_cancelled() {
                    yield IndexingProgressUpdate::cancelled();
                    return;
                }

                let workspace = async {
                    let stats = self.ide.get_stats(directory).await?;
                    let branch = self.ide.get_branch(directory).await?;
                    let repo_name = self.ide.get_repo_name(directory).await?;
                    Ok::<_, Error>((stats, branch, repo_name))
                };
                let (stats, branch, repo_name) = match workspace.await {
                    Ok(found) => found,
                    Err(e) => {
                        yield Self::failure(None, &e);
                        return;
                    }
                };
                info!(directory = %directory, branch = %branch, files = stats.len(), "Indexing directory");

                for (completed_artifacts, index) in indexes.iter().enumerate() {
                    if cancel.is_cancelled() {
                        yield IndexingProgressUpdate::cancelled();
                        return;
                    }

                    let artifact = index.artifact_id().to_string();
                    let tag = IndexTag::new(directory.as_str(), branch.as_str(), artifact.as_str());
                    let (diff, commit) = match self
                        .db
                        .compute_refresh_diff(&tag, &stats, self.ide.as_ref())
                        .await
                    {
                        Ok(found) => found,
                        Err(e) => {
                            yield Self::failure(Some(&artifact), &e);
                            return;
                        }
                    };
                    info!(
                        tag = %tag,
                        added = diff.added.len(),
                        removed = diff.removed.len(),
                        unchanged = diff.unchanged,
                        "Updating artifact"
                    );

                    let mut updates = index.update(tag, diff, commit, repo_name.clone());
                    while let Some(item) = updates.next().await {
                        let step = match item {
                            Ok(step) => step,
                            Err(e) => {
                                yield Self::failure(Some(&artifact), &e);
                                return;
                            }
                        };
                        if !self.wait_if_paused(&cancel).await {
                            yield IndexingProgressUpdate::cancelled();
                            return;
                        }
                        let progress = overall_progress(
                            completed_dirs,
                            total_dirs,
                            completed_artifacts,
                            total_artifacts,
                            step.progress,
                        );
                        yield tracker.update(progress, step.desc, IndexingStatus::Indexing);
                    }

                    let progress = overall_progress(
                        completed_dirs,
                        total_dirs,
                        completed_artifacts + 1,
                        total_artifacts,
                        0.0,
                    );
                    yield tracker.update(
                        progress,
                        format!("Completed indexing {}", artifact),
                        IndexingStatus::Indexing,
                    );
                }

                let progress = (completed_dirs + 1) as f64 / total_dirs as f64;
                yield tracker.update(progress, format!("Indexed {}", directory), IndexingStatus::Indexing);
            }

            info!(directories = total_dirs, "Indexing complete");
            yield IndexingProgressUpdate::done();
        }
        .boxed_local()
    }
}
