//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "codeindex")]
#[command(
    author,
    version,
    about = "Incrementally index a codebase into chunk, embedding, full-text and snippet stores"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "cli")]
    pub format: OutputFormat,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true, env = "CODEINDEX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bring every index of the given directories up to date
    ///
    /// Type `pause`, `resume` or `cancel` on stdin while it runs.
    Refresh(RefreshArgs),

    /// Show committed baselines and store sizes
    Status(StatusArgs),

    /// Compact the database
    Cleanup,
}

#[derive(Args)]
pub struct RefreshArgs {
    /// Workspace directories, in indexing order
    #[arg(default_value = ".")]
    pub dirs: Vec<PathBuf>,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Only show these directories
    pub dirs: Vec<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Cli,
    Json,
}

/// Absolute form of a directory argument; left as given when it cannot be resolved
pub fn directory_arg(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .to_string()
}
