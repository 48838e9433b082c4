//! Per-tag statistics

use super::Database;
use crate::artifacts::{CHUNKS_ARTIFACT_ID, FULL_TEXT_ARTIFACT_ID, SNIPPETS_ARTIFACT_ID};
use crate::error::Result;
use crate::refresh::IndexTag;
use serde::Serialize;

/// Baseline and store sizes for one tag
#[derive(Debug, Clone, Serialize)]
pub struct TagSummary {
    pub tag: IndexTag,
    /// Files in the committed baseline
    pub files: usize,
    /// Rows the artifact store holds for the tag
    pub rows: usize,
}

impl Database {
    /// Summaries of every tag with a committed baseline
    pub fn tag_summaries(&self, directory: Option<&str>) -> Result<Vec<TagSummary>> {
        self.catalog_tags(directory)?
            .into_iter()
            .map(|(tag, files)| {
                let rows = self.artifact_row_count(&tag)?;
                Ok(TagSummary { tag, files, rows })
            })
            .collect()
    }

    fn artifact_row_count(&self, tag: &IndexTag) -> Result<usize> {
        match tag.artifact_id.as_str() {
            CHUNKS_ARTIFACT_ID => self.count_chunks(tag),
            FULL_TEXT_ARTIFACT_ID => self.count_full_text(tag),
            SNIPPETS_ARTIFACT_ID => self.count_snippets(tag),
            // Vector artifact ids carry the model name
            _ => self.count_embeddings(tag),
        }
    }

    /// Vacuum the database
    pub fn vacuum(&self) -> Result<()> {
        self.conn.execute("VACUUM", [])?;
        Ok(())
    }
}
