//! Codeindex Core Library
//!
//! Incremental, multi-artifact indexing of source trees.
//!
//! # Features
//! - Per-artifact baselines: only files added, modified or removed since the
//!   last committed run are processed
//! - AST-aware chunking via tree-sitter
//! - Vector embeddings with a global per-chunk cache
//! - SQLite FTS5 full-text index
//! - Structural code snippets (functions, classes, ...)
//! - Pausable, cancellable refresh with a single normalized progress value

pub mod artifacts;
pub mod config;
pub mod db;
pub mod error;
pub mod ide;
pub mod index;
pub mod llm;
pub mod pipeline;
pub mod refresh;
pub mod remote;

pub use artifacts::{
    ArtifactProgress, ChunkCodebaseIndex, CodeSnippetsCodebaseIndex, CodebaseIndex,
    EmbeddingsCodebaseIndex, FullTextSearchCodebaseIndex,
};
pub use config::{Config, ConfigHandler, FileConfigHandler, StaticConfigHandler};
pub use db::Database;
pub use error::{CodeIndexError, Error, Result};
pub use ide::{FileStat, FileStats, Ide, LocalIde};
pub use index::{ChunkType, CodeChunk, SemanticChunker};
pub use llm::{Embedder, HashEmbedder, HttpEmbedder};
pub use pipeline::{CodebaseIndexer, IndexingProgressUpdate, IndexingStatus, PauseToken};
pub use refresh::{IndexTag, PathAndCacheKey, PendingCommit, RefreshDiff};
pub use remote::RemoteCacheClient;

/// Default cache directory name
pub const CACHE_DIR_NAME: &str = "codeindex";

/// Default config directory name
pub const CONFIG_DIR_NAME: &str = "codeindex";
