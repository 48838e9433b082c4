//! Error types for codeindex

use thiserror::Error;

/// Result type alias using CodeIndexError
pub type Result<T> = std::result::Result<T, CodeIndexError>;

/// Error type alias for convenience
pub type Error = CodeIndexError;

/// Exit codes for CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NOT_FOUND: i32 = 2;
    pub const INVALID_INPUT: i32 = 3;
}

/// Main error type for codeindex
#[derive(Debug, Error)]
pub enum CodeIndexError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("No chunks stored for {path} ({cache_key}); the chunk index must run first")]
    MissingChunks { path: String, cache_key: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Glob pattern error: {0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External service error: {0}")]
    ExternalError(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CodeIndexError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::DirectoryNotFound(_) => exit_codes::NOT_FOUND,
            Self::InvalidInput(_) | Self::Config(_) => exit_codes::INVALID_INPUT,
            _ => exit_codes::GENERAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            CodeIndexError::DirectoryNotFound("/nope".into()).exit_code(),
            exit_codes::NOT_FOUND
        );
        assert_eq!(
            CodeIndexError::Config("bad".into()).exit_code(),
            exit_codes::INVALID_INPUT
        );
        assert_eq!(
            CodeIndexError::Index("boom".into()).exit_code(),
            exit_codes::GENERAL_ERROR
        );
    }

    #[test]
    fn test_missing_chunks_message() {
        let err = CodeIndexError::MissingChunks {
            path: "/src/lib.rs".into(),
            cache_key: "abc".into(),
        };
        assert!(err.to_string().contains("/src/lib.rs"));
        assert!(err.to_string().contains("chunk index"));
    }
}
