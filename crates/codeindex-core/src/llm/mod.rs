//! Embedding providers
//!
//! The vector index talks to an [`Embedder`]. Two implementations ship:
//! an OpenAI-compatible HTTP client and an offline feature-hashing embedder.

mod hash_embedder;
mod http_embedder;
mod traits;

pub use hash_embedder::{HashEmbedder, DEFAULT_HASH_DIMENSIONS};
pub use http_embedder::HttpEmbedder;
pub use traits::Embedder;

use crate::config::EmbeddingsProviderConfig;
use crate::error::Result;
use std::sync::Arc;

/// Build the embedder described by the configuration
pub fn embedder_from_config(config: &EmbeddingsProviderConfig) -> Result<Arc<dyn Embedder>> {
    Ok(match config {
        EmbeddingsProviderConfig::Http {
            url,
            model,
            api_key,
            dimensions,
            timeout_secs,
            ..
        } => Arc::new(HttpEmbedder::new(
            url.clone(),
            model.clone(),
            api_key.clone(),
            *dimensions,
            *timeout_secs,
        )?),
        EmbeddingsProviderConfig::Hash { dimensions } => Arc::new(HashEmbedder::new(*dimensions)),
    })
}
