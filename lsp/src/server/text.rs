use std::sync::Arc;

use tower_lsp::lsp_types::TextDocumentContentChangeEvent;
use tracing::warn;

use crate::analyzer::compile;
use crate::position::position_offset;

use super::state::SpxLanguageServer;

/// One whole-content file replacement.
#[derive(Debug, Clone)]
pub(crate) struct FileChange {
    pub(crate) path: String,
    pub(crate) content: Arc<str>,
    pub(crate) version: i64,
}

impl SpxLanguageServer {
    /// Applies file changes synchronously (version-monotonic writes), then
    /// recomputes and publishes diagnostics for the changed documents from a
    /// detached task. Publication is fire-and-forget: a later change simply
    /// supersedes the diagnostics of an earlier one.
    pub(crate) fn did_modify_file(&self, changes: Vec<FileChange>) {
        {
            let mut proj = self.project.write().unwrap();
            for change in &changes {
                proj.put_file(&change.path, change.content.clone(), change.version);
            }
        }

        let project = self.project.clone();
        let analyzers = self.analyzers.clone();
        let client = self.client.clone();
        let root = self.root_uri.read().unwrap().clone();
        tokio::spawn(async move {
            let compiled = {
                let proj = project.read().unwrap();
                compile(&proj, &root, &analyzers)
            };
            let result = match compiled {
                Ok(result) => result,
                Err(err) => {
                    warn!("skipping diagnostics publication: {err}");
                    return;
                }
            };
            for change in changes {
                let uri = result.to_document_uri(&change.path);
                let diags = result.diagnostics.get(&uri).cloned().unwrap_or_default();
                let version = i32::try_from(change.version).ok();
                client.publish_diagnostics(uri, diags, version).await;
            }
        });
    }

    /// Resolves the new content of a changed document: a single rangeless
    /// change replaces the whole text, otherwise the edits are applied as
    /// byte-offset splices through the position translator.
    pub(crate) fn changed_text(
        &self,
        path: &str,
        changes: Vec<TextDocumentContentChangeEvent>,
    ) -> Result<String, String> {
        if changes.is_empty() {
            return Err("no content changes provided".to_string());
        }
        if changes.len() == 1 && changes[0].range.is_none() {
            let mut changes = changes;
            return Ok(changes.remove(0).text);
        }
        self.apply_incremental_changes(path, changes)
    }

    fn apply_incremental_changes(
        &self,
        path: &str,
        changes: Vec<TextDocumentContentChangeEvent>,
    ) -> Result<String, String> {
        let mut content = {
            let proj = self.project.read().unwrap();
            let file = proj.file(path).ok_or_else(|| "file not found".to_string())?;
            file.content.to_string()
        };

        for change in changes {
            let Some(range) = change.range else {
                return Err("unexpected nil range for change".to_string());
            };
            let start = position_offset(&content, range.start);
            let end = position_offset(&content, range.end);
            if end < start {
                return Err("invalid range for content change".to_string());
            }
            content.replace_range(start..end, &change.text);
        }
        Ok(content)
    }
}
