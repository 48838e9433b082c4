//! Refresh command

use crate::app::{directory_arg, OutputFormat, RefreshArgs};
use crate::progress::ProgressReporter;
use anyhow::{bail, Result};
use codeindex_core::{
    CodebaseIndexer, ConfigHandler, Database, FileConfigHandler, IndexingProgressUpdate,
    IndexingStatus, LocalIde, PauseToken, RemoteCacheClient,
};
use futures::StreamExt;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn run(
    args: RefreshArgs,
    db: &Database,
    config_path: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let config_handler = match config_path {
        Some(path) => FileConfigHandler::new(path),
        None => FileConfigHandler::default_location(),
    };
    info!(config = %config_handler.path().display(), "Loading config");

    let config = config_handler.load_config().await?;
    let ide = Arc::new(LocalIde::new(&config.scan));
    let remote = RemoteCacheClient::from_config(config.remote_cache.as_ref())?;

    let pause = PauseToken::default();
    let cancel = CancellationToken::new();
    let indexer = CodebaseIndexer::new(db, Arc::new(config_handler), ide, pause.clone(), remote);

    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };
    let mut pause_changes = pause.subscribe();
    spawn_stdin_controls(pause, cancel.clone());

    let dirs: Vec<String> = args.dirs.iter().map(|d| directory_arg(d)).collect();
    let mut reporter = ProgressReporter::new(format);
    let mut updates = indexer.refresh(dirs, cancel);
    let mut progress = 0.0;
    loop {
        tokio::select! {
            update = updates.next() => {
                let Some(update) = update else { break };
                progress = update.progress;
                reporter.report(&update)?;
            }
            Ok(()) = pause_changes.changed() => {
                let paused = *pause_changes.borrow_and_update();
                let update = if paused {
                    IndexingProgressUpdate::paused(progress)
                } else {
                    IndexingProgressUpdate::resumed(progress)
                };
                reporter.report(&update)?;
            }
        }
    }
    ctrl_c.abort();

    if reporter.last_status() == Some(IndexingStatus::Failed) {
        bail!("Indexing failed");
    }
    Ok(())
}

/// Read `pause`, `resume` and `cancel` lines from stdin
///
/// Runs on a detached thread since a blocking stdin read cannot be
/// interrupted; it ends with stdin or the process.
fn spawn_stdin_controls(pause: PauseToken, cancel: CancellationToken) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "pause" => pause.set_paused(true),
                "resume" => pause.set_paused(false),
                "cancel" => {
                    cancel.cancel();
                    pause.set_paused(false);
                }
                _ => {}
            }
        }
    });
}
