//! File scanning, language detection and chunking

mod chunker;
mod language;
mod scanner;
mod syntax;

pub use chunker::{compute_chunk_hash, CodeChunk, SemanticChunker, MAX_CHUNK_CHARS};
pub use language::Language;
pub use scanner::{scan_files, ScanOptions, ScanResult};
pub use syntax::{extract_definitions, ChunkType, Definition};
