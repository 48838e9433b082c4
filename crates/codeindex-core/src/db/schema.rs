//! Database schema and initialization

use crate::error::Result;
use rusqlite::{params, Connection};
use std::path::Path;

/// Main database handle
///
/// Holds the tag catalog (committed baselines) and every artifact store.
/// Each artifact indexer only touches its own tables.
pub struct Database {
    pub(crate) conn: Connection,
}

const SCHEMA_VERSION: i32 = 3;

const CREATE_TABLES: &str = r#"
-- Committed baselines, one row per (tag, file)
CREATE TABLE IF NOT EXISTS tag_catalog (
    dir TEXT NOT NULL,
    branch TEXT NOT NULL,
    artifact_id TEXT NOT NULL,
    path TEXT NOT NULL,
    cache_key TEXT NOT NULL,
    last_modified INTEGER NOT NULL,
    size INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (dir, branch, artifact_id, path)
);

-- Files whose store rows changed since the last committed baseline
CREATE TABLE IF NOT EXISTS tag_dirty (
    dir TEXT NOT NULL,
    branch TEXT NOT NULL,
    artifact_id TEXT NOT NULL,
    path TEXT NOT NULL,
    cache_key TEXT NOT NULL,
    PRIMARY KEY (dir, branch, artifact_id, path)
);

-- Chunk store
CREATE TABLE IF NOT EXISTS chunks (
    tag TEXT NOT NULL,
    path TEXT NOT NULL,
    cache_key TEXT NOT NULL,
    seq INTEGER NOT NULL,
    chunk_type TEXT NOT NULL,
    breadcrumb TEXT,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    content TEXT NOT NULL,
    chunk_hash TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (tag, path, seq)
);

-- Model metadata for dimension validation
CREATE TABLE IF NOT EXISTS model_metadata (
    model TEXT PRIMARY KEY,
    dimensions INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    last_used_at TEXT NOT NULL
);

-- Global chunk embeddings cache, shared by every tag
CREATE TABLE IF NOT EXISTS chunk_embeddings (
    chunk_hash TEXT NOT NULL,
    model TEXT NOT NULL,
    embedding BLOB NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (chunk_hash, model)
);

-- Vector store
CREATE TABLE IF NOT EXISTS embeddings (
    tag TEXT NOT NULL,
    path TEXT NOT NULL,
    cache_key TEXT NOT NULL,
    seq INTEGER NOT NULL,
    chunk_hash TEXT NOT NULL,
    model TEXT NOT NULL,
    embedding BLOB NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (tag, path, seq)
);

-- Full-text store
CREATE VIRTUAL TABLE IF NOT EXISTS fts USING fts5(
    path,
    content,
    tokenize='porter unicode61'
);

CREATE TABLE IF NOT EXISTS fts_metadata (
    id INTEGER PRIMARY KEY,
    tag TEXT NOT NULL,
    path TEXT NOT NULL,
    cache_key TEXT NOT NULL,
    UNIQUE(tag, path)
);

-- Structural code snippets
CREATE TABLE IF NOT EXISTS code_snippets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tag TEXT NOT NULL,
    path TEXT NOT NULL,
    cache_key TEXT NOT NULL,
    kind TEXT NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_chunks_tag_path ON chunks(tag, path);
CREATE INDEX IF NOT EXISTS idx_embeddings_tag_path ON embeddings(tag, path);
CREATE INDEX IF NOT EXISTS idx_code_snippets_tag_path ON code_snippets(tag, path);
"#;

impl Database {
    /// Open database at path, creating if necessary
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Initialize database schema
    pub fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA cache_size = -64000;
             PRAGMA busy_timeout = 5000;",
        )?;

        self.conn.execute_batch(CREATE_TABLES)?;

        // Migrations run before the version is stamped
        self.migrate()?;

        self.conn.execute(
            "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION],
        )?;

        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> Result<Option<i32>> {
        let version = self
            .conn
            .query_row(
                "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .ok();
        Ok(version)
    }

    /// Run migrations to upgrade schema to current version
    pub fn migrate(&self) -> Result<()> {
        let current = self.schema_version()?.unwrap_or(0);

        if current < 2 {
            self.migrate_to_v2()?;
        }
        if current < 3 {
            // v3 only adds `tag_dirty`, created above
            self.conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![3],
            )?;
        }

        Ok(())
    }

    fn migrate_to_v2(&self) -> Result<()> {
        // v1 catalogs did not record file sizes
        let has_size: bool = self
            .conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM pragma_table_info('tag_catalog') WHERE name = 'size'",
                [],
                |row| row.get(0),
            )
            .unwrap_or(false);

        if !has_size {
            self.conn.execute(
                "ALTER TABLE tag_catalog ADD COLUMN size INTEGER NOT NULL DEFAULT 0",
                [],
            )?;
        }

        self.conn.execute(
            "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
            params![2],
        )?;

        Ok(())
    }

    /// Run `f` inside an immediate transaction, rolling back on error
    pub(crate) fn in_transaction<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.conn.execute("BEGIN IMMEDIATE", [])?;
        let result = f();

        if result.is_ok() {
            self.conn.execute("COMMIT", [])?;
        } else {
            let _ = self.conn.execute("ROLLBACK", []);
        }
        result
    }
}
