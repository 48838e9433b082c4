//! Splitting files into embeddable chunks
//!
//! Supported languages are cut along top-level definitions (with their doc
//! comments); the code between definitions becomes `Text` chunks. Other files
//! are treated as one text segment. Any segment longer than the size limit is
//! split on line boundaries.

use super::language::Language;
use super::syntax::{extract_definitions, ChunkType, Definition};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Default upper bound on chunk size, in bytes
pub const MAX_CHUNK_CHARS: usize = 3200;

const MIN_CHUNK_CHARS: usize = 16;

/// One chunk of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChunk {
    pub chunk_type: ChunkType,
    pub breadcrumb: Option<String>,
    /// 1-indexed, inclusive
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    /// blake3 of the content, shared across files and branches
    pub chunk_hash: String,
}

/// Hash identifying chunk content (32 hex chars of blake3)
pub fn compute_chunk_hash(content: &str) -> String {
    let hash = blake3::hash(content.as_bytes());
    hash.to_hex()[..32].to_string()
}

struct Segment<'s> {
    kind: ChunkType,
    breadcrumb: Option<String>,
    start_line: usize,
    text: &'s str,
}

/// AST-aware chunker with a plain-text fallback
#[derive(Debug, Clone)]
pub struct SemanticChunker {
    max_chunk_chars: usize,
}

impl Default for SemanticChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticChunker {
    pub fn new() -> Self {
        Self {
            max_chunk_chars: MAX_CHUNK_CHARS,
        }
    }

    pub fn with_max_chunk_chars(self, max: usize) -> Self {
        Self {
            max_chunk_chars: max.max(MIN_CHUNK_CHARS),
        }
    }

    pub fn max_chunk_chars(&self) -> usize {
        self.max_chunk_chars
    }

    /// Chunk `content`, using `path` to pick a grammar
    pub fn chunk(&self, content: &str, path: &Path) -> Vec<CodeChunk> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let segments = match Language::from_path(path) {
            Some(language) => match extract_definitions(content, language) {
                Ok(definitions) => outline(content, &definitions),
                Err(e) => {
                    debug!(
                        error = %e,
                        path = %path.display(),
                        "Parse failed, chunking as plain text"
                    );
                    vec![whole_file(content)]
                }
            },
            None => vec![whole_file(content)],
        };

        segments
            .into_iter()
            .flat_map(|segment| self.split(segment))
            .collect()
    }

    fn split(&self, segment: Segment<'_>) -> Vec<CodeChunk> {
        let max = self.max_chunk_chars;
        if segment.text.len() <= max {
            return make_chunk(&segment, segment.start_line, segment.text)
                .into_iter()
                .collect();
        }

        let mut chunks = Vec::new();
        let mut buf = String::new();
        let mut buf_line = segment.start_line;

        for (offset, line) in segment.text.split_inclusive('\n').enumerate() {
            let line_no = segment.start_line + offset;

            if !buf.is_empty() && buf.len() + line.len() > max {
                chunks.extend(make_chunk(&segment, buf_line, &buf));
                buf.clear();
            }

            if line.len() > max {
                for piece in split_long_line(line, max) {
                    chunks.extend(make_chunk(&segment, line_no, piece));
                }
                continue;
            }

            if buf.is_empty() {
                buf_line = line_no;
            }
            buf.push_str(line);
        }
        chunks.extend(make_chunk(&segment, buf_line, &buf));

        chunks
    }
}

fn make_chunk(segment: &Segment<'_>, start_line: usize, text: &str) -> Option<CodeChunk> {
    if text.trim().is_empty() {
        return None;
    }
    let lines = text.trim_end_matches('\n').matches('\n').count();
    Some(CodeChunk {
        chunk_type: segment.kind,
        breadcrumb: segment.breadcrumb.clone(),
        start_line,
        end_line: start_line + lines,
        content: text.to_string(),
        chunk_hash: compute_chunk_hash(text),
    })
}

fn whole_file(content: &str) -> Segment<'_> {
    Segment {
        kind: ChunkType::Text,
        breadcrumb: None,
        start_line: 1,
        text: content,
    }
}

/// Byte offset of the start of the line containing `byte`
fn line_start(source: &str, byte: usize) -> usize {
    source[..byte].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

/// Byte offset just past the end of the line containing `byte`
fn line_end(source: &str, byte: usize) -> usize {
    source[byte..]
        .find('\n')
        .map(|i| byte + i + 1)
        .unwrap_or(source.len())
}

fn line_number(source: &str, byte: usize) -> usize {
    source[..byte].matches('\n').count() + 1
}

/// Cover the file with outermost definitions and the text between them
fn outline<'s>(source: &'s str, definitions: &[Definition]) -> Vec<Segment<'s>> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    let push_gap = |segments: &mut Vec<Segment<'s>>, from: usize, to: usize| {
        if from < to && !source[from..to].trim().is_empty() {
            segments.push(Segment {
                kind: ChunkType::Text,
                breadcrumb: None,
                start_line: line_number(source, from),
                text: &source[from..to],
            });
        }
    };

    for def in definitions {
        if def.start_byte < cursor {
            continue;
        }

        let start = line_start(source, def.doc_start_byte).max(cursor);
        let end = line_end(source, def.end_byte.saturating_sub(1).max(def.start_byte));

        push_gap(&mut segments, cursor, start);
        segments.push(Segment {
            kind: def.kind,
            breadcrumb: def.breadcrumb.clone(),
            start_line: line_number(source, start),
            text: &source[start..end],
        });
        cursor = end;
    }
    push_gap(&mut segments, cursor, source.len());

    segments
}

fn split_long_line(line: &str, max: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = line;

    while rest.len() > max {
        let mut cut = max;
        while cut > 0 && !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == 0 {
            cut = rest.chars().next().map(char::len_utf8).unwrap_or(rest.len());
        }
        let (head, tail) = rest.split_at(cut);
        pieces.push(head);
        rest = tail;
    }
    if !rest.is_empty() {
        pieces.push(rest);
    }

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_file_splits_on_definitions() {
        let content = r#"use std::fmt;

/// A greeting function
fn hello() {
    println!("Hello, world!");
}

struct Point {
    x: i32,
}
"#;
        let chunks = SemanticChunker::new().chunk(content, Path::new("lib.rs"));
        let kinds: Vec<_> = chunks.iter().map(|c| c.chunk_type).collect();
        assert_eq!(
            kinds,
            vec![ChunkType::Text, ChunkType::Function, ChunkType::Struct]
        );

        let hello = &chunks[1];
        assert!(hello.content.starts_with("/// A greeting function"));
        assert_eq!(hello.start_line, 3);
        assert_eq!(hello.end_line, 6);
        assert_eq!(hello.breadcrumb.as_deref(), Some("hello"));

        // Every non-blank line of the file lands in some chunk
        let joined: String = chunks.iter().map(|c| c.content.as_str()).collect();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            assert!(joined.contains(line), "missing line {:?}", line);
        }
    }

    #[test]
    fn test_unsupported_language_is_one_text_chunk() {
        let content = "# Title\n\nSome prose.\n";
        let chunks = SemanticChunker::new().chunk(content, Path::new("README.md"));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type, ChunkType::Text);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 3));
    }

    #[test]
    fn test_empty_file_has_no_chunks() {
        assert!(SemanticChunker::new()
            .chunk("  \n\n", Path::new("a.py"))
            .is_empty());
    }

    #[test]
    fn test_oversized_segments_split_by_lines() {
        let content: String = (1..=40).map(|i| format!("line number {:02}\n", i)).collect();
        let chunker = SemanticChunker::new().with_max_chunk_chars(100);
        let chunks = chunker.chunk(&content, Path::new("notes.txt"));

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.content.len() <= 100));
        assert_eq!(chunks[0].start_line, 1);
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start_line, pair[0].end_line + 1);
        }
        assert_eq!(chunks.last().unwrap().end_line, 40);
    }

    #[test]
    fn test_long_line_respects_char_boundaries() {
        let line = "é".repeat(50);
        let pieces = split_long_line(&line, 17);
        assert!(pieces.iter().all(|p| p.len() <= 17));
        assert_eq!(pieces.concat(), line);
    }

    #[test]
    fn test_chunk_hash_depends_only_on_content() {
        assert_eq!(compute_chunk_hash("fn a() {}"), compute_chunk_hash("fn a() {}"));
        assert_ne!(compute_chunk_hash("fn a() {}"), compute_chunk_hash("fn b() {}"));
        assert_eq!(compute_chunk_hash("x").len(), 32);
    }

    #[test]
    fn test_min_chunk_size() {
        let chunker = SemanticChunker::new().with_max_chunk_chars(0);
        assert_eq!(chunker.max_chunk_chars(), MIN_CHUNK_CHARS);
    }
}
