//! Snippet index: named structural units (functions, classes, ...) per file

use super::{run_file_ops, ArtifactStream, CodebaseIndex, FileOpHandler, SNIPPETS_ARTIFACT_ID};
use crate::db::{CodeSnippet, Database};
use crate::error::Result;
use crate::ide::Ide;
use crate::index::{extract_definitions, Language};
use crate::refresh::{IndexTag, PathAndCacheKey, PendingCommit, RefreshDiff};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub struct CodeSnippetsCodebaseIndex<'a> {
    db: &'a Database,
    ide: Arc<dyn Ide>,
    max_file_bytes: u64,
}

impl<'a> CodeSnippetsCodebaseIndex<'a> {
    pub fn new(db: &'a Database, ide: Arc<dyn Ide>, max_file_bytes: u64) -> Self {
        Self {
            db,
            ide,
            max_file_bytes,
        }
    }
}

/// Snippets of a source file; unsupported languages have none
pub fn snippets_for(path: &str, content: &str) -> Result<Vec<CodeSnippet>> {
    let Some(language) = Language::from_path(Path::new(path)) else {
        return Ok(Vec::new());
    };

    let snippets = extract_definitions(content, language)?
        .into_iter()
        .map(|def| {
            let text = def.text(content);
            let title = def
                .breadcrumb
                .clone()
                .unwrap_or_else(|| text.lines().next().unwrap_or_default().trim().to_string());
            CodeSnippet {
                kind: def.kind.as_str().to_string(),
                title,
                content: text.to_string(),
                start_line: def.start_line,
                end_line: def.end_line,
            }
        })
        .collect();

    Ok(snippets)
}

#[async_trait(?Send)]
impl FileOpHandler for CodeSnippetsCodebaseIndex<'_> {
    type Prefetch = ();

    async fn prefetch(
        &self,
        _tag: &IndexTag,
        _added: &[PathAndCacheKey],
        _repo_name: &str,
    ) -> Result<()> {
        Ok(())
    }

    async fn add(&self, tag: &IndexTag, file: &PathAndCacheKey, _: &()) -> Result<()> {
        let snippets = if Language::from_path(Path::new(&file.path)).is_some() {
            let content = self.ide.read_file(&file.path).await?;
            if content.len() as u64 > self.max_file_bytes {
                Vec::new()
            } else {
                snippets_for(&file.path, &content)?
            }
        } else {
            Vec::new()
        };

        self.db
            .replace_snippets(tag, &file.path, &file.cache_key, &snippets)
    }

    async fn remove(&self, tag: &IndexTag, file: &PathAndCacheKey) -> Result<()> {
        self.db.delete_snippets(tag, &file.path)?;
        Ok(())
    }
}

impl CodebaseIndex for CodeSnippetsCodebaseIndex<'_> {
    fn artifact_id(&self) -> &str {
        SNIPPETS_ARTIFACT_ID
    }

    fn update<'s>(
        &'s self,
        tag: IndexTag,
        diff: RefreshDiff,
        commit: PendingCommit,
        repo_name: String,
    ) -> ArtifactStream<'s> {
        run_file_ops(self, self.db, tag, diff, commit, repo_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_titles() {
        let source = "class Cart:\n    def total(self):\n        return 0\n";
        let snippets = snippets_for("/w/cart.py", source).unwrap();

        let titles: Vec<_> = snippets.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Cart", "Cart::total"]);
        assert_eq!(snippets[1].kind, "method");
        assert_eq!((snippets[1].start_line, snippets[1].end_line), (2, 3));
    }

    #[test]
    fn test_unsupported_language_has_no_snippets() {
        assert!(snippets_for("/w/notes.md", "# fn main() {}").unwrap().is_empty());
    }
}
