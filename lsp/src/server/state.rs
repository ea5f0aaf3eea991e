use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use tower_lsp::lsp_types::Url;
use tower_lsp::Client;

use spxls_core::project::Project;

use crate::analyzer::{compile, default_analyzers, Analyzer, CompileError, CompileResult};

/// Versions generated for `didSave` notifications without a client version
/// start far above any plausible client-side counter, keeping the two
/// version spaces from colliding.
const SAVE_VERSION_BASE: i64 = 1 << 40;

/// The language server: a single project snapshot behind a single-writer,
/// many-reader lock, plus the registered analyzers. Each request handler
/// runs on its own task and compiles the current snapshot on demand.
pub(crate) struct SpxLanguageServer {
    pub(crate) client: Client,
    pub(crate) project: Arc<RwLock<Project>>,
    pub(crate) root_uri: RwLock<String>,
    pub(crate) analyzers: Arc<Vec<Arc<dyn Analyzer>>>,
    save_version: AtomicI64,
}

impl SpxLanguageServer {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            project: Arc::new(RwLock::new(Project::new(Vec::<(String, String)>::new()))),
            root_uri: RwLock::new("file:///".to_string()),
            analyzers: Arc::new(default_analyzers()),
            save_version: AtomicI64::new(SAVE_VERSION_BASE),
        }
    }

    /// Compiles the current snapshot.
    pub(crate) fn compile(&self) -> Result<CompileResult, CompileError> {
        let proj = self.project.read().unwrap();
        let root = self.root_uri.read().unwrap().clone();
        compile(&proj, &root, &self.analyzers)
    }

    pub(crate) fn set_root_uri(&self, uri: Option<&Url>) {
        if let Some(uri) = uri {
            let mut root = uri.to_string();
            if !root.ends_with('/') {
                root.push('/');
            }
            *self.root_uri.write().unwrap() = root;
        }
    }

    /// Strips the workspace root prefix off a document URI.
    pub(crate) fn from_document_uri(&self, uri: &Url) -> Option<String> {
        let root = self.root_uri.read().unwrap();
        uri.as_str().strip_prefix(root.as_str()).map(str::to_string)
    }

    pub(crate) fn next_save_version(&self) -> i64 {
        self.save_version.fetch_add(1, Ordering::SeqCst)
    }
}
