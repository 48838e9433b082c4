//! Database layer for codeindex
//!
//! One SQLite file holds:
//! - the tag catalog (committed baselines)
//! - the chunk, vector, FTS5 full-text and snippet stores
//! - a global embedding cache keyed by chunk hash and model

mod catalog;
mod chunks;
mod fulltext;
mod schema;
mod snippets;
mod stats;
pub mod vectors;

pub use catalog::CatalogEntry;
pub use chunks::StoredChunk;
pub use schema::Database;
pub use snippets::CodeSnippet;
pub use stats::TagSummary;
pub use vectors::{CacheLookupResult, EmbeddingRow};
use std::path::PathBuf;

impl Database {
    /// Default database path, overridable with `CODEINDEX_DB`
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("CODEINDEX_DB") {
            return PathBuf::from(path);
        }
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CACHE_DIR_NAME)
            .join("index.sqlite")
    }
}
