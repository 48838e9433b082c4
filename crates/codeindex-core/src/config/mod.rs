//! Configuration management

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directories never descended into while collecting file stats
const EXCLUDE_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    ".cache",
    "vendor",
    "dist",
    "build",
    "__pycache__",
    ".venv",
    "target",
];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Skip indexing entirely; `refresh` reports a disabled status
    #[serde(default)]
    pub disable_indexing: bool,

    /// Embeddings provider used by the vector index
    #[serde(default)]
    pub embeddings: EmbeddingsProviderConfig,

    /// Optional remote index cache
    #[serde(default)]
    pub remote_cache: Option<RemoteCacheConfig>,

    /// Which files of a workspace directory are indexed
    #[serde(default)]
    pub scan: ScanConfig,
}

/// Embeddings provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum EmbeddingsProviderConfig {
    /// OpenAI-compatible `/v1/embeddings` endpoint (vLLM, OpenAI, etc.)
    Http {
        url: String,
        #[serde(default = "default_embedding_model")]
        model: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default)]
        dimensions: Option<usize>,
        #[serde(default = "default_timeout")]
        timeout_secs: u64,
        #[serde(default = "default_batch_size")]
        batch_size: usize,
    },
    /// Deterministic feature-hashing embedder, needs no network
    Hash {
        #[serde(default = "default_hash_dimensions")]
        dimensions: usize,
    },
}

impl Default for EmbeddingsProviderConfig {
    fn default() -> Self {
        Self::Hash {
            dimensions: default_hash_dimensions(),
        }
    }
}

fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_batch_size() -> usize {
    32
}

fn default_hash_dimensions() -> usize {
    256
}

/// Remote index cache endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCacheConfig {
    pub url: String,
    #[serde(default)]
    pub user_token: Option<String>,
}

/// File selection for a workspace directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Glob pattern relative to the directory root
    #[serde(default = "default_pattern")]
    pub pattern: String,

    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,

    #[serde(default)]
    pub include_hidden: bool,

    /// Files above this size are tracked but produce no chunks or snippets
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            exclude_dirs: default_exclude_dirs(),
            include_hidden: false,
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_pattern() -> String {
    "**/*".to_string()
}

fn default_exclude_dirs() -> Vec<String> {
    EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect()
}

fn default_max_file_bytes() -> u64 {
    1024 * 1024
}

impl Config {
    /// Load config from default path
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load config from a specific path, falling back to defaults when absent
    ///
    /// `CODEINDEX_EMBEDDING_*` environment variables override the file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&content)?
        } else {
            Config::default()
        };
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Switch to an HTTP embeddings provider when `CODEINDEX_EMBEDDING_URL` is set
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = var("CODEINDEX_EMBEDDING_URL") {
            let dimensions: Option<usize> = match var("CODEINDEX_EMBEDDING_DIMS") {
                Some(raw) => Some(raw.trim().parse().map_err(|_| {
                    Error::Config(format!("CODEINDEX_EMBEDDING_DIMS is not a number: {}", raw))
                })?),
                None => None,
            };
            let (timeout_secs, batch_size) = match &self.embeddings {
                EmbeddingsProviderConfig::Http {
                    timeout_secs,
                    batch_size,
                    ..
                } => (*timeout_secs, *batch_size),
                EmbeddingsProviderConfig::Hash { .. } => (default_timeout(), default_batch_size()),
            };
            self.embeddings = EmbeddingsProviderConfig::Http {
                url,
                model: default_embedding_model(),
                api_key: var("CODEINDEX_EMBEDDING_API_KEY"),
                dimensions,
                timeout_secs,
                batch_size,
            };
        }

        if let EmbeddingsProviderConfig::Http { model, .. } = &mut self.embeddings {
            if let Some(name) = var("CODEINDEX_EMBEDDING_MODEL") {
                *model = name;
            }
        }
        Ok(())
    }

    /// Reject settings no indexer can run with
    pub fn validate(&self) -> Result<()> {
        match &self.embeddings {
            EmbeddingsProviderConfig::Http { batch_size: 0, .. } => Err(Error::Config(
                "embeddings.batch_size must be at least 1".to_string(),
            )),
            EmbeddingsProviderConfig::Http {
                dimensions: Some(0),
                ..
            }
            | EmbeddingsProviderConfig::Hash { dimensions: 0 } => Err(Error::Config(
                "embeddings.dimensions must be at least 1".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Save config to a path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        std::env::var("CODEINDEX_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(crate::CONFIG_DIR_NAME)
                    .join("config.yml")
            })
    }
}

/// Source of configuration for an indexing run
///
/// `load_config` may be called several times per run and must not mutate anything.
#[async_trait]
pub trait ConfigHandler: Send + Sync {
    async fn load_config(&self) -> Result<Config>;
}

/// Reads the YAML file on every call so edits apply to the next refresh
pub struct FileConfigHandler {
    path: PathBuf,
}

impl FileConfigHandler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_location() -> Self {
        Self::new(Config::default_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigHandler for FileConfigHandler {
    async fn load_config(&self) -> Result<Config> {
        Config::load_from(&self.path)
    }
}

/// Fixed in-memory configuration
pub struct StaticConfigHandler {
    config: Config,
}

impl StaticConfigHandler {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConfigHandler for StaticConfigHandler {
    async fn load_config(&self) -> Result<Config> {
        Ok(self.config.clone())
    }
}
