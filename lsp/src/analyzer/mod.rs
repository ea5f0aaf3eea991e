mod analyzers;
mod compile;
mod definition;
mod highlight;
mod refs;
mod resource;
mod semantic_tokens;

#[cfg(test)]
mod tests;

pub use analyzers::{default_analyzers, Analyzer, AnalyzerPass};
pub use compile::{compile, CompileError};
pub use definition::{
    definitions_for_ident, is_event_handler_func_name, parse_overload_func_name, split_gopt_method_name,
    to_lower_camel_case, walk_struct, SpxDefinition, SpxDefinitionKind,
};
pub(crate) use definition::definitions_for_object;
pub use highlight::document_highlights;
pub use resource::*;
pub use semantic_tokens::{semantic_token_legend, semantic_tokens_for};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hasher;
use std::sync::{Arc, Mutex};

use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, DocumentLink, Position, Range, SemanticToken, Url};
use twox_hash::XxHash64;

use spxls_core::ast;
use spxls_core::ast::walk::{walk, Node};
use spxls_core::project::PkgDoc;
use spxls_core::token::{ParseError, Pos, TokenFile};
use spxls_core::typ::{NamedId, ObjectId, TypeInfo};

use crate::position::{from_position, range_for_span, to_position};

/// One source file captured into a compile result: content, token file and
/// AST all belong to the same snapshot.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub content: Arc<str>,
    pub version: i64,
    pub token_file: Arc<TokenFile>,
    pub ast: Arc<ast::File>,
    pub parse_errors: Vec<ParseError>,
}

/// An identifier occurrence, recorded by span and name. Identity against the
/// type info tables is the starting position.
#[derive(Debug, Clone)]
pub struct IdentSpan {
    pub pos: Pos,
    pub end: Pos,
    pub name: String,
}

#[derive(Default, Debug)]
struct ComputedCache {
    idents_at_lines: Mutex<HashMap<(String, u32), Arc<Vec<IdentSpan>>>>,
    defs_for_named_structs: Mutex<HashMap<NamedId, Arc<Vec<SpxDefinition>>>>,
    document_links: Mutex<HashMap<Url, Arc<Vec<DocumentLink>>>>,
    semantic_tokens: Mutex<HashMap<Url, Arc<Vec<SemanticToken>>>>,
}

/// The immutable product of one analysis pass over a snapshot: sources, type
/// info, the resource index, diagnostics, and lazily-memoised derived
/// indices. Created per compile call and never shared across snapshots.
#[derive(Debug)]
pub struct CompileResult {
    root_uri: String,

    pub files: BTreeMap<String, SourceFile>,
    pub tinfo: Arc<TypeInfo>,
    pub pkg_doc: Arc<PkgDoc>,

    /// Path of the stage file, literally named `main.spx`.
    pub main_spx_file: String,
    pub resource_root_dir: String,
    pub resource_set: SpxResourceSet,

    pub resource_refs: Vec<SpxResourceRef>,
    seen_resource_refs: HashSet<SpxResourceRef>,

    pub sound_auto_bindings: HashSet<ObjectId>,
    pub sprite_auto_bindings: HashSet<ObjectId>,

    pub diagnostics: HashMap<Url, Vec<Diagnostic>>,
    seen_diagnostics: HashMap<Url, HashSet<u64>>,
    pub has_error_severity_diagnostic: bool,

    computed: ComputedCache,
}

impl CompileResult {
    pub(crate) fn new(root_uri: &str, tinfo: Arc<TypeInfo>, pkg_doc: Arc<PkgDoc>) -> Self {
        Self {
            root_uri: root_uri.to_string(),
            files: BTreeMap::new(),
            tinfo,
            pkg_doc,
            main_spx_file: String::new(),
            resource_root_dir: String::new(),
            resource_set: SpxResourceSet::default(),
            resource_refs: Vec::new(),
            seen_resource_refs: HashSet::new(),
            sound_auto_bindings: HashSet::new(),
            sprite_auto_bindings: HashSet::new(),
            diagnostics: HashMap::new(),
            seen_diagnostics: HashMap::new(),
            has_error_severity_diagnostic: false,
            computed: ComputedCache::default(),
        }
    }

    pub fn to_document_uri(&self, path: &str) -> Url {
        Url::parse(&format!("{}{}", self.root_uri, path))
            .unwrap_or_else(|_| Url::parse("file:///invalid").expect("static URI"))
    }

    pub fn from_document_uri(&self, uri: &Url) -> Option<String> {
        uri.as_str().strip_prefix(&self.root_uri).map(str::to_string)
    }

    pub fn source_file(&self, path: &str) -> Option<&SourceFile> {
        self.files.get(path)
    }

    /// The source file whose token range contains `pos`.
    pub fn file_of_pos(&self, pos: Pos) -> Option<&SourceFile> {
        self.files.values().find(|f| f.token_file.contains(pos))
    }

    pub fn pos_document_uri(&self, pos: Pos) -> Option<Url> {
        self.file_of_pos(pos).map(|f| self.to_document_uri(&f.path))
    }

    pub fn range_for_span(&self, span: (Pos, Pos)) -> Range {
        match self.file_of_pos(span.0) {
            Some(source) => range_for_span(source, span.0, span.1),
            None => Range::default(),
        }
    }

    pub fn range_for_pos(&self, pos: Pos) -> Range {
        self.range_for_span((pos, pos))
    }

    /// Adds a diagnostic, deduplicated per document by the
    /// (severity, range, message) fingerprint.
    pub fn add_diagnostic(&mut self, uri: Url, diag: Diagnostic) {
        let mut hasher = XxHash64::default();
        hasher.write(format!("{:?}\n{:?}\n{}", diag.severity, diag.range, diag.message).as_bytes());
        let fingerprint = hasher.finish();

        let seen = self.seen_diagnostics.entry(uri.clone()).or_default();
        if !seen.insert(fingerprint) {
            return;
        }
        if diag.severity == Some(DiagnosticSeverity::ERROR) {
            self.has_error_severity_diagnostic = true;
        }
        self.diagnostics.entry(uri).or_default().push(diag);
    }

    pub(crate) fn add_error(&mut self, uri: Url, range: Range, message: impl Into<String>) {
        self.add_diagnostic(
            uri,
            Diagnostic {
                range,
                severity: Some(DiagnosticSeverity::ERROR),
                message: message.into(),
                ..Default::default()
            },
        );
    }

    pub(crate) fn add_warning(&mut self, uri: Url, range: Range, message: impl Into<String>) {
        self.add_diagnostic(
            uri,
            Diagnostic {
                range,
                severity: Some(DiagnosticSeverity::WARNING),
                message: message.into(),
                ..Default::default()
            },
        );
    }

    /// Records a resource reference, deduplicated by (id, kind, node).
    pub fn add_resource_ref(&mut self, r: SpxResourceRef) {
        if self.seen_resource_refs.insert(r.clone()) {
            self.resource_refs.push(r);
        }
    }

    /// Identifiers on one line of a file, lazily indexed and memoised.
    pub fn idents_at_line(&self, source: &SourceFile, line: u32) -> Arc<Vec<IdentSpan>> {
        let key = (source.path.clone(), line);
        if let Some(cached) = self.computed.idents_at_lines.lock().unwrap().get(&key) {
            return cached.clone();
        }

        let mut idents = Vec::new();
        walk(Node::File(&source.ast), &mut |node| {
            let ident = match node {
                Node::Ident(id) => Some(id),
                Node::Expr(ast::Expr::Ident(id)) => Some(id),
                _ => None,
            };
            if let Some(id) = ident {
                if id.pos != spxls_core::token::NO_POS && source.token_file.line_for(id.pos) == line {
                    idents.push(IdentSpan {
                        pos: id.pos,
                        end: id.end(),
                        name: id.name.clone(),
                    });
                }
            }
            true
        });

        let idents = Arc::new(idents);
        self.computed
            .idents_at_lines
            .lock()
            .unwrap()
            .insert(key, idents.clone());
        idents
    }

    /// The identifier covering the LSP position, if any.
    pub fn ident_at_position(&self, source: &SourceFile, position: Position) -> Option<IdentSpan> {
        let pos = crate::position::pos_at(source, position);
        let line = source.token_file.line_for(pos);
        let idents = self.idents_at_line(source, line);
        idents.iter().find(|id| id.pos <= pos && pos < id.end).cloned()
    }

    /// The smallest-spanned resource reference covering `position` on its
    /// line in `source`.
    pub fn resource_ref_at_position(&self, source: &SourceFile, position: Position) -> Option<&SpxResourceRef> {
        let target = to_position(source, position);
        let mut best: Option<(&SpxResourceRef, u32)> = None;
        for r in &self.resource_refs {
            let Some(file) = self.file_of_pos(r.span.0) else {
                continue;
            };
            if file.path != source.path {
                continue;
            }
            let node_pos = file.token_file.position(r.span.0);
            let node_end = file.token_file.position(r.span.1);
            if target.line != node_pos.line || target.column < node_pos.column || target.column > node_end.column {
                continue;
            }
            let width = node_end.column - node_pos.column;
            let better = match best {
                Some((_, best_width)) => width < best_width,
                None => true,
            };
            if better {
                best = Some((r, width));
            }
        }
        best.map(|(r, _)| r)
    }

    /// Every definition reachable as a member of the named struct, memoised.
    pub fn definitions_for_named_struct(&self, named: NamedId) -> Arc<Vec<SpxDefinition>> {
        if let Some(cached) = self.computed.defs_for_named_structs.lock().unwrap().get(&named) {
            return cached.clone();
        }
        let mut defs = Vec::new();
        walk_struct(&self.tinfo, named, &mut |member, selector| {
            defs.extend(definition::definitions_for_object(
                self,
                member,
                Some(self.tinfo.named_type(selector).name.clone()),
            ));
            true
        });
        let defs = Arc::new(defs);
        self.computed
            .defs_for_named_structs
            .lock()
            .unwrap()
            .insert(named, defs.clone());
        defs
    }

    /// Document links for one document: every resource reference in the file
    /// linked to its `spx://resources/...` URI. Memoised per document.
    pub fn document_links(&self, source: &SourceFile) -> Arc<Vec<DocumentLink>> {
        let uri = self.to_document_uri(&source.path);
        if let Some(cached) = self.computed.document_links.lock().unwrap().get(&uri) {
            return cached.clone();
        }
        let mut links = Vec::new();
        for r in &self.resource_refs {
            let Some(file) = self.file_of_pos(r.span.0) else {
                continue;
            };
            if file.path != source.path {
                continue;
            }
            links.push(DocumentLink {
                range: self.range_for_span(r.span),
                target: Url::parse(&r.id.uri()).ok(),
                tooltip: Some(r.id.name().to_string()),
                data: None,
            });
        }
        let links = Arc::new(links);
        self.computed
            .document_links
            .lock()
            .unwrap()
            .insert(uri, links.clone());
        links
    }

    /// Semantic tokens for one document, memoised per document URI.
    pub fn semantic_tokens(&self, source: &SourceFile) -> Arc<Vec<SemanticToken>> {
        let uri = self.to_document_uri(&source.path);
        if let Some(cached) = self.computed.semantic_tokens.lock().unwrap().get(&uri) {
            return cached.clone();
        }
        let tokens = Arc::new(semantic_tokens_for(self, source));
        self.computed
            .semantic_tokens
            .lock()
            .unwrap()
            .insert(uri, tokens.clone());
        tokens
    }

    /// Whether `pos` lies inside a callback argument of an spx event-handler
    /// call (`onStart`, `onMsg`, ...).
    pub fn is_in_spx_event_handler(&self, pos: Pos) -> bool {
        let Some(source) = self.file_of_pos(pos) else {
            return false;
        };
        let (path, _) = ast::path_enclosing_interval(&source.ast, pos.saturating_sub(1), pos);
        for node in &path {
            let Node::Expr(ast::Expr::Call(call)) = node else {
                continue;
            };
            if call.args.is_empty() {
                continue;
            }
            let ast::Expr::Ident(fun) = call.fun.unparen() else {
                continue;
            };
            let Some(obj) = self.tinfo.object_of(fun.pos) else {
                continue;
            };
            if self.tinfo.object(obj).pkg != spxls_core::typ::Pkg::Spx {
                continue;
            }
            if is_event_handler_func_name(&fun.name) {
                return true;
            }
        }
        false
    }

    /// The definition location of an object, when it has one in this
    /// snapshot.
    pub fn location_for_object(&self, obj: ObjectId) -> Option<(Url, Range)> {
        let object = self.tinfo.object(obj);
        if object.decl_pos == spxls_core::token::NO_POS {
            return None;
        }
        let source = self.file_of_pos(object.decl_pos)?;
        let end = object.decl_pos + object.name.len() as Pos;
        Some((
            self.to_document_uri(&source.path),
            range_for_span(source, object.decl_pos, end),
        ))
    }

    /// LSP position of a token-file position within this result.
    pub fn lsp_position(&self, source: &SourceFile, pos: Pos) -> Position {
        from_position(source, source.token_file.position(pos))
    }
}
